use core::fmt;
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vpnnotify.json";
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Settings for one invocation, read from the JSON config file.
///
/// Keys keep the names already deployed in `/etc/vpnnotify.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "RedisServer")]
    pub redis_server: String,
    #[serde(rename = "RedisPort", default = "default_redis_port")]
    pub redis_port: u16,
    #[serde(rename = "RedisPassword", default)]
    pub redis_password: Option<Secret>,
    #[serde(rename = "RedisDB", default)]
    pub redis_db: i64,
    #[serde(rename = "RedisTLS", default)]
    pub redis_tls: bool,

    #[serde(rename = "LDAPServer")]
    pub ldap_server: String,
    #[serde(rename = "LDAPPort", default = "default_ldap_port")]
    pub ldap_port: u16,
    #[serde(rename = "LDAPBaseDN")]
    pub ldap_base_dn: String,
    /// Attribute matched against the connecting identity.
    #[serde(rename = "LDAPUserAttrib")]
    pub ldap_user_attrib: String,
    /// Attribute holding the chat handle.
    #[serde(rename = "LDAPHandleAttrib", default = "default_handle_attrib")]
    pub ldap_handle_attrib: String,
    #[serde(rename = "LDAPSkipVerify", default)]
    pub ldap_skip_verify: bool,

    #[serde(rename = "GeoIPEnabled", default)]
    pub geoip_enabled: bool,
    #[serde(rename = "GeoIPPath", default)]
    pub geoip_path: Option<PathBuf>,

    #[serde(rename = "TemplatePath", default)]
    pub template_path: Option<PathBuf>,

    #[serde(rename = "SlackKey")]
    pub slack_key: Secret,
    #[serde(rename = "SlackAPIURL", default = "default_slack_api_url")]
    pub slack_api_url: String,

    /// Seconds during which a reconnect from the same address stays quiet.
    #[serde(rename = "RenotifyTime", default = "default_renotify_time")]
    pub renotify_time: u64,
}

impl Config {
    /// Read and validate the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, lacks a
    /// required key, or carries contradictory settings.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&data)
    }

    /// Parse and validate a config document.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, missing required keys, or
    /// contradictory settings.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.geoip_enabled && self.geoip_path.is_none() {
            return Err(ConfigError::Invalid(
                "GeoIPEnabled is set but GeoIPPath is missing".to_owned(),
            ));
        }
        if self.redis_server.trim().is_empty() {
            return Err(ConfigError::Invalid("RedisServer is empty".to_owned()));
        }
        if self.ldap_server.trim().is_empty() {
            return Err(ConfigError::Invalid("LDAPServer is empty".to_owned()));
        }
        Ok(())
    }

    /// Geolocation database path, only when lookups are switched on.
    #[must_use]
    pub fn geoip_database(&self) -> Option<&Path> {
        if self.geoip_enabled {
            self.geoip_path.as_deref()
        } else {
            None
        }
    }
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

const fn default_redis_port() -> u16 {
    6379
}

const fn default_ldap_port() -> u16 {
    389
}

fn default_handle_attrib() -> String {
    "slackName".to_owned()
}

fn default_slack_api_url() -> String {
    DEFAULT_SLACK_API_URL.to_owned()
}

const fn default_renotify_time() -> u64 {
    3900
}
