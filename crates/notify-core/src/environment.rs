use core::fmt;

use tokio::process::Command;
use tracing::{debug, warn};

/// Deployment environment the VPN server belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
    Bunker,
    Ua,
    Unknown,
}

// Checked in order; the first hit wins.
const MARKERS: [(&str, Environment); 4] = [
    ("dev", Environment::Dev),
    ("prod", Environment::Prod),
    ("bunker", Environment::Bunker),
    ("ua", Environment::Ua),
];

impl Environment {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
            Self::Bunker => "bunker",
            Self::Ua => "ua",
            Self::Unknown => "NONE",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[must_use]
pub fn classify(fqdn: &str) -> Environment {
    MARKERS
        .iter()
        .find(|(marker, _)| fqdn.contains(marker))
        .map_or(Environment::Unknown, |&(_, env)| env)
}

/// Fully-qualified name of this host, as `hostname -f` reports it.
pub async fn local_fqdn() -> Option<String> {
    let output = match Command::new("hostname").arg("-f").output().await {
        Ok(output) => output,
        Err(e) => {
            warn!(error = %e, "Failed to run hostname -f");
            return None;
        }
    };
    if !output.status.success() {
        warn!(status = %output.status, "hostname -f exited unsuccessfully");
        return None;
    }
    let fqdn = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    (!fqdn.is_empty()).then_some(fqdn)
}

/// Classify `fqdn_override` if given, otherwise this host's FQDN.
pub async fn detect(fqdn_override: Option<&str>) -> Environment {
    let fqdn = match fqdn_override {
        Some(name) => Some(name.to_owned()),
        None => local_fqdn().await,
    };
    let env = fqdn.as_deref().map_or(Environment::Unknown, classify);
    debug!(fqdn = ?fqdn, env = %env, "Classified deployment environment");
    env
}
