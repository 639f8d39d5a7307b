use core::{fmt, net::Ipv6Addr, time::Duration};

use async_trait::async_trait;
use notify_core::{Config, ConnectionRecord, StateStore, StoreError};
use redis::{AsyncCommands as _, aio::MultiplexedConnection};
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

#[must_use]
pub fn address_key(identity: &str) -> String {
    format!("vpn:{identity}:lastip")
}

#[must_use]
pub fn time_key(identity: &str) -> String {
    format!("vpn:{identity}:lasttime")
}

/// Connection state in Redis, two plain keys per identity with no expiry.
///
/// A single multiplexed connection is opened on first use and shared by
/// every later call.
pub struct RedisStore {
    client: Result<redis::Client, String>,
    endpoint: String,
    connection: OnceCell<MultiplexedConnection>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.connection.initialized())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Build a client from the config. Does not touch the network.
    ///
    /// Settings that cannot form a connection URL are not rejected here;
    /// every later `load` and `save` reports them as a connect failure.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let client = connection_url(config)
            .and_then(|url| {
                redis::Client::open(url.as_str()).map_err(|e| StoreError::Connect(Box::new(e)))
            })
            .map_err(|e| e.to_string());
        Self {
            client,
            endpoint: format!("{}:{}/{}", config.redis_server, config.redis_port, config.redis_db),
            connection: OnceCell::new(),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| StoreError::Connect(e.clone().into()))?;
        self.connection
            .get_or_try_init(|| async {
                debug!(endpoint = %self.endpoint, "Connecting to Redis");
                client
                    .get_multiplexed_async_connection_with_timeouts(
                        RESPONSE_TIMEOUT,
                        CONNECT_TIMEOUT,
                    )
                    .await
                    .map_err(|e| StoreError::Connect(Box::new(e)))
            })
            .await
            .cloned()
    }
}

/// `redis://` or `rediss://` URL with the password percent-encoded.
///
/// # Errors
///
/// Returns an error if the pieces do not form a valid URL.
pub fn connection_url(config: &Config) -> Result<Url, StoreError> {
    let scheme = if config.redis_tls { "rediss" } else { "redis" };
    let host = match config.redis_server.parse::<Ipv6Addr>() {
        Ok(v6) => format!("[{v6}]"),
        Err(_) => config.redis_server.clone(),
    };
    let mut url = Url::parse(&format!(
        "{scheme}://{host}:{}/{}",
        config.redis_port, config.redis_db
    ))
    .map_err(|e| StoreError::Connect(Box::new(e)))?;
    if let Some(password) = config
        .redis_password
        .as_ref()
        .map(notify_core::Secret::expose)
        .filter(|p| !p.is_empty())
    {
        url.set_password(Some(password))
            .map_err(|()| StoreError::Connect("Redis URL cannot carry a password".into()))?;
    }
    Ok(url)
}

/// Parse the stored pair. A missing or garbled time reads as 0.
fn record_from(address: Option<String>, time: Option<String>) -> Option<ConnectionRecord> {
    let address = address?;
    let time = time.and_then(|t| t.trim().parse::<i64>().ok()).unwrap_or(0);
    Some(ConnectionRecord { address, time })
}

#[async_trait]
impl StateStore for RedisStore {
    async fn load(&self, identity: &str) -> Result<Option<ConnectionRecord>, StoreError> {
        let mut conn = self.connection().await?;
        let address_key = address_key(identity);
        let address: Option<String> = conn.get(&address_key).await.map_err(|e| StoreError::Read {
            key: address_key.clone(),
            source: Box::new(e),
        })?;
        let time_key = time_key(identity);
        let time: Option<String> = conn.get(&time_key).await.map_err(|e| StoreError::Read {
            key: time_key.clone(),
            source: Box::new(e),
        })?;
        debug!(
            endpoint = %self.endpoint,
            last_ip = ?address,
            last_time = ?time,
            "Loaded connection state"
        );
        Ok(record_from(address, time))
    }

    async fn save(&self, identity: &str, record: &ConnectionRecord) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let address_key = address_key(identity);
        conn.set::<_, _, ()>(&address_key, &record.address)
            .await
            .map_err(|e| StoreError::Write {
                key: address_key.clone(),
                source: Box::new(e),
            })?;
        let time_key = time_key(identity);
        conn.set::<_, _, ()>(&time_key, record.time)
            .await
            .map_err(|e| StoreError::Write {
                key: time_key.clone(),
                source: Box::new(e),
            })?;
        Ok(())
    }
}
