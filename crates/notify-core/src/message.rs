use std::{borrow::Cow, fs, path::PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::{Config, GeoLocation, environment::Environment, error::TemplateError};

/// Used when `TemplatePath` is not configured.
pub const DEFAULT_TEMPLATE: &str = "\
New VPN session on {{ Env }} from {{ IP }}\
{% if GeoIP %} ({{ City }}, {{ State }}, {{ Country }}){% endif %}.
If this wasn't you, tell the security team right away.";

#[derive(Debug, Serialize)]
struct MessageContext<'a> {
    #[serde(rename = "IP")]
    ip: &'a str,
    #[serde(rename = "Env")]
    env: &'static str,
    #[serde(rename = "GeoIP")]
    geoip: bool,
    #[serde(rename = "City", skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
    #[serde(rename = "State", skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(rename = "Country", skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
}

impl<'a> MessageContext<'a> {
    fn new(env: Environment, address: &'a str, geo: Option<&'a GeoLocation>) -> Self {
        Self {
            ip: address,
            env: env.label(),
            geoip: geo.is_some(),
            city: geo.map(|g| g.city.as_str()),
            state: geo.map(|g| g.state.as_str()),
            country: geo.map(|g| g.country.as_str()),
        }
    }
}

/// Renders the notification text.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    template_path: Option<PathBuf>,
}

impl Composer {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            template_path: config.template_path.clone(),
        }
    }

    /// Template source: the configured file, or [`DEFAULT_TEMPLATE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configured file cannot be read.
    pub fn template_source(&self) -> Result<Cow<'static, str>, TemplateError> {
        let Some(path) = &self.template_path else {
            return Ok(Cow::Borrowed(DEFAULT_TEMPLATE));
        };
        fs::read_to_string(path)
            .map(Cow::Owned)
            .map_err(|source| TemplateError::Read {
                path: path.clone(),
                source,
            })
    }

    /// # Errors
    ///
    /// Returns an error if `source` is not a valid template or fails to render.
    pub fn render(
        source: &str,
        env: Environment,
        address: &str,
        geo: Option<&GeoLocation>,
    ) -> Result<String, TemplateError> {
        let jinja = minijinja::Environment::new();
        let ctx = MessageContext::new(env, address, geo);
        Ok(jinja.render_str(source, ctx)?)
    }

    /// Best-effort rendering: failures are logged and yield an empty message.
    #[must_use]
    pub fn compose(&self, env: Environment, address: &str, geo: Option<&GeoLocation>) -> String {
        let source = match self.template_source() {
            Ok(source) => source,
            Err(e) => {
                warn!(error = %e, "Unable to read template for chat message");
                Cow::Borrowed("")
            }
        };
        Self::render(&source, env, address, geo).unwrap_or_else(|e| {
            warn!(error = %e, "Unable to render template for chat message");
            String::new()
        })
    }
}
