use core::time::Duration;

use async_trait::async_trait;
use notify_core::{ChatSender, Config, Delivery, DeliveryError, Secret};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::debug;

/// Posts direct messages through the Slack Web API.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    api_url: String,
    token: Secret,
    timeout: Duration,
}

impl SlackNotifier {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_url: config.slack_api_url.trim_end_matches('/').to_owned(),
            token: config.slack_key.clone(),
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat.postMessage", self.api_url)
    }
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    as_user: bool,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Slack message timestamps look like `1700000000.000100`.
fn format_message_ts(ts: &str) -> Option<String> {
    let secs: i64 = ts.split('.').next()?.parse().ok()?;
    OffsetDateTime::from_unix_timestamp(secs)
        .ok()?
        .format(&Rfc3339)
        .ok()
}

#[async_trait]
impl ChatSender for SlackNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<Delivery, DeliveryError> {
        let payload = PostMessage {
            channel: recipient,
            text,
            as_user: true,
        };
        let rsp = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.token.expose())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(Box::new(e)))?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        let body: PostMessageResponse = rsp
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(Box::new(e)))?;
        if !body.ok {
            return Err(DeliveryError::Api(
                body.error.unwrap_or_else(|| "unknown_error".to_owned()),
            ));
        }

        let timestamp = body.ts.unwrap_or_default();
        debug!(
            recipient = %recipient,
            sent_at = ?format_message_ts(&timestamp),
            "Slack accepted message"
        );
        Ok(Delivery {
            channel: body.channel.unwrap_or_else(|| recipient.to_owned()),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    use super::*;

    fn notifier(base_url: &str) -> SlackNotifier {
        let config = Config::from_json(&format!(
            r#"{{
                "RedisServer": "redis",
                "LDAPServer": "ldap",
                "LDAPBaseDN": "dc=example,dc=com",
                "LDAPUserAttrib": "uid",
                "SlackKey": "xoxb-test",
                "SlackAPIURL": "{base_url}/"
            }}"#
        ))
        .unwrap();
        SlackNotifier::from_config(&config).with_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    async fn posts_message_with_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat.postMessage")
                    .header("authorization", "Bearer xoxb-test")
                    .json_body(json!({ "channel": "@jdoe", "text": "hello", "as_user": true }));
                then.status(200).json_body(json!({
                    "ok": true,
                    "channel": "D024BE91L",
                    "ts": "1700000000.000100"
                }));
            })
            .await;

        let delivery = notifier(&server.base_url())
            .send("@jdoe", "hello")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(delivery.channel, "D024BE91L");
        assert_eq!(delivery.timestamp, "1700000000.000100");
    }

    #[tokio::test]
    async fn api_error_code_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat.postMessage");
                then.status(200)
                    .json_body(json!({ "ok": false, "error": "channel_not_found" }));
            })
            .await;

        let err = notifier(&server.base_url())
            .send("@ghost", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Api(ref code) if code == "channel_not_found"));
    }

    #[tokio::test]
    async fn http_failure_is_reported_with_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat.postMessage");
                then.status(503);
            })
            .await;

        let err = notifier(&server.base_url())
            .send("@jdoe", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Status(503)));
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let err = notifier("http://127.0.0.1:9")
            .send("@jdoe", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }

    #[test]
    fn message_timestamps_format_as_rfc3339() {
        assert_eq!(
            format_message_ts("1700000000.000100").as_deref(),
            Some("2023-11-14T22:13:20Z")
        );
        assert_eq!(format_message_ts("not-a-ts"), None);
    }
}
