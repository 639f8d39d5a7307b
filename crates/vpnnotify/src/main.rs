mod logging;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context as _, Result};
use clap::Parser;
use notify_core::{
    Collaborators, Config, ConnectionEvent, GeoLocator, Outcome, config::DEFAULT_CONFIG_PATH,
    environment, handle_connection,
};
use notify_geoip::MaxMindLocator;
use notify_ldap::LdapDirectory;
use notify_redis::RedisStore;
use notify_slack::SlackNotifier;
use time::OffsetDateTime;
use tracing::{Instrument as _, debug, error, info_span, warn};

use crate::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(
    name = "vpnnotify",
    version,
    about = "OpenVPN client-connect hook that tells users about new VPN sessions"
)]
struct Args {
    /// JSON config file
    #[arg(long, env = "VPNNOTIFY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Connecting identity, normally exported by OpenVPN
    #[arg(long, env = "common_name")]
    common_name: Option<String>,

    /// Source address of the connection, normally exported by OpenVPN
    #[arg(long, env = "untrusted_ip")]
    untrusted_ip: Option<String>,

    /// Classify this name instead of the local FQDN
    #[arg(long, env = "VPNNOTIFY_FQDN")]
    fqdn: Option<String>,

    /// Arguments OpenVPN appends to client-connect scripts; unused
    #[arg(hide = true)]
    openvpn_args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help, version, or a bad flag: never hold up the VPN server over it.
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("vpnnotify aborted: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Treat unset, empty, and whitespace-only values alike.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn run(args: Args) -> Result<()> {
    let (Some(identity), Some(address)) = (present(args.common_name), present(args.untrusted_ip))
    else {
        debug!("common_name or untrusted_ip not set, nothing to do");
        return Ok(());
    };

    let config = Config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let store = RedisStore::from_config(&config);
    let directory = LdapDirectory::from_config(&config);
    let chat = SlackNotifier::from_config(&config);

    let event = ConnectionEvent {
        identity,
        address,
        timestamp: OffsetDateTime::now_utc().unix_timestamp(),
        environment: environment::detect(args.fqdn.as_deref()).await,
    };
    let span = info_span!("connection", identity = %event.identity, address = %event.address);

    async {
        let geo = open_geolocation(&config);
        let deps = Collaborators {
            store: &store,
            directory: &directory,
            geo: geo.as_ref().map(|g| g as &dyn GeoLocator),
            chat: &chat,
        };
        let outcome = handle_connection(&config, deps, &event).await;
        log_outcome(&outcome);
    }
    .instrument(span)
    .await;

    Ok(())
}

fn open_geolocation(config: &Config) -> Option<MaxMindLocator> {
    let path = config.geoip_database()?;
    MaxMindLocator::open(path)
        .inspect_err(|e| warn!(error = %e, "Geolocation disabled for this connection"))
        .ok()
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Delivered { recipient, .. } => debug!(recipient = %recipient, "Notified"),
        Outcome::Suppressed
        | Outcome::EmptyMessage
        | Outcome::NoRecipient(_)
        | Outcome::DeliveryFailed(_) => debug!(outcome = ?outcome, "Finished without notifying"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn args(common_name: Option<&str>, untrusted_ip: Option<&str>, config: PathBuf) -> Args {
        Args {
            config,
            common_name: common_name.map(ToOwned::to_owned),
            untrusted_ip: untrusted_ip.map(ToOwned::to_owned),
            fqdn: Some("vpn.dev.example.com".to_owned()),
            openvpn_args: Vec::new(),
        }
    }

    #[test]
    fn blank_values_count_as_absent() {
        assert_eq!(present(None), None);
        assert_eq!(present(Some(String::new())), None);
        assert_eq!(present(Some("  ".to_owned())), None);
        assert_eq!(present(Some("jdoe".to_owned())), Some("jdoe".to_owned()));
    }

    #[test]
    fn accepts_openvpn_trailing_arguments() {
        let parsed = Args::try_parse_from([
            "vpnnotify",
            "--config",
            "/tmp/vpnnotify.json",
            "--common-name",
            "jdoe",
            "--untrusted-ip",
            "1.2.3.4",
            "/tmp/openvpn_cc_1234.tmp",
        ])
        .unwrap();
        assert_eq!(parsed.config, PathBuf::from("/tmp/vpnnotify.json"));
        assert_eq!(parsed.common_name.as_deref(), Some("jdoe"));
        assert_eq!(parsed.untrusted_ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(parsed.openvpn_args, vec!["/tmp/openvpn_cc_1234.tmp".to_owned()]);
    }

    #[tokio::test]
    async fn missing_identity_exits_before_loading_config() {
        let missing = PathBuf::from("/nonexistent/vpnnotify.json");
        assert!(run(args(None, Some("1.2.3.4"), missing.clone())).await.is_ok());
        assert!(run(args(Some("jdoe"), None, missing.clone())).await.is_ok());
        assert!(run(args(Some(""), Some("1.2.3.4"), missing)).await.is_ok());
    }

    #[tokio::test]
    async fn unreadable_config_is_fatal() {
        let missing = PathBuf::from("/nonexistent/vpnnotify.json");
        let err = run(args(Some("jdoe"), Some("1.2.3.4"), missing))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("loading config"));
    }

    fn config_file(redis_server: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "RedisServer": "{redis_server}",
                "RedisPort": 1,
                "LDAPServer": "127.0.0.1",
                "LDAPPort": 1,
                "LDAPBaseDN": "dc=example,dc=com",
                "LDAPUserAttrib": "uid",
                "GeoIPEnabled": true,
                "GeoIPPath": "/nonexistent/GeoLite2-City.mmdb",
                "SlackKey": "xoxb-test",
                "SlackAPIURL": "http://127.0.0.1:9"
            }}"#
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn unreachable_services_still_succeed() {
        let file = config_file("127.0.0.1");
        let result = run(args(Some("jdoe"), Some("1.2.3.4"), file.path().to_owned())).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unusable_redis_address_is_not_fatal() {
        for server in ["::1", "bad host"] {
            let file = config_file(server);
            let result = run(args(Some("jdoe"), Some("1.2.3.4"), file.path().to_owned())).await;
            assert!(result.is_ok(), "{server}: {result:?}");
        }
    }
}
