use core::time::Duration;
use std::collections::HashMap;

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings, Scope, SearchEntry, ldap_escape};
use notify_core::{Config, Directory, DirectoryError};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Finds chat handles in an LDAP directory over StartTLS.
#[derive(Debug, Clone)]
pub struct LdapDirectory {
    url: String,
    base_dn: String,
    user_attrib: String,
    handle_attrib: String,
    skip_verify: bool,
}

impl LdapDirectory {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: format!("ldap://{}:{}", config.ldap_server, config.ldap_port),
            base_dn: config.ldap_base_dn.clone(),
            user_attrib: config.ldap_user_attrib.clone(),
            handle_attrib: config.ldap_handle_attrib.clone(),
            skip_verify: config.ldap_skip_verify,
        }
    }

    #[must_use]
    pub fn search_filter(&self, identity: &str) -> String {
        format!("({}={})", self.user_attrib, ldap_escape(identity))
    }

    fn settings(&self) -> LdapConnSettings {
        LdapConnSettings::new()
            .set_conn_timeout(CONNECT_TIMEOUT)
            .set_starttls(true)
            .set_no_tls_verify(self.skip_verify)
    }
}

fn backend(e: ldap3::LdapError) -> DirectoryError {
    DirectoryError::Backend(e.to_string().into())
}

/// First value of `attr`, matched case-insensitively as LDAP does.
fn handle_of(attrs: &HashMap<String, Vec<String>>, attr: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .and_then(|(_, values)| values.first().cloned())
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn search(&self, identity: &str) -> Result<Vec<Option<String>>, DirectoryError> {
        let (conn, mut ldap) = LdapConnAsync::with_settings(self.settings(), &self.url)
            .await
            .map_err(backend)?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection error");
            }
        });

        let filter = self.search_filter(identity);
        debug!(url = %self.url, base = %self.base_dn, filter = %filter, "Searching directory");
        let result = ldap
            .search(
                &self.base_dn,
                Scope::Subtree,
                &filter,
                vec![self.handle_attrib.as_str()],
            )
            .await
            .and_then(ldap3::SearchResult::success);
        if let Err(e) = ldap.unbind().await {
            debug!(error = %e, "LDAP unbind failed");
        }
        let (entries, _) = result.map_err(backend)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| handle_of(&entry.attrs, &self.handle_attrib))
            .collect())
    }
}
