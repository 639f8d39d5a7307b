pub mod config;
pub mod contact;
pub mod decision;
pub mod environment;
pub mod error;
pub mod hook;
pub mod message;

use async_trait::async_trait;

pub use config::{Config, Secret};
pub use contact::resolve_contact;
pub use decision::{Decision, decide};
pub use environment::Environment;
pub use error::{
    BoxError, ConfigError, DeliveryError, DirectoryError, GeolocationError, StoreError,
    TemplateError,
};
pub use hook::{Collaborators, ConnectionEvent, Outcome, handle_connection};
pub use message::Composer;

/// Last sighting of an identity: source address and epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub address: String,
    pub time: i64,
}

/// Where the last sighting of each identity is kept between runs.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, identity: &str) -> Result<Option<ConnectionRecord>, StoreError>;
    async fn save(&self, identity: &str, record: &ConnectionRecord) -> Result<(), StoreError>;
}

/// Directory search by identity.
///
/// Returns one item per matching entry, holding that entry's chat handle
/// attribute if it has one.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn search(&self, identity: &str) -> Result<Vec<Option<String>>, DirectoryError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoLocation {
    pub city: String,
    pub state: String,
    /// ISO 3166-1 alpha-2 code.
    pub country: String,
}

pub trait GeoLocator: Send + Sync {
    fn lookup(&self, address: &str) -> Result<GeoLocation, GeolocationError>;
}

/// Receipt for a delivered chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: String,
    pub timestamp: String,
}

#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<Delivery, DeliveryError>;
}
