//! Failure kinds, one enum per collaborator.
//!
//! Only [`ConfigError`] stops a run. Everything else is logged by the
//! pipeline and the connection proceeds with whatever data is left.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Boxed error from a backend client library.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store connection failed: {0}")]
    Connect(#[source] BoxError),

    #[error("failed to read {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to write {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("no directory entry matches {identity}")]
    NoContactFound { identity: String },

    #[error("{count} directory entries match {identity}")]
    AmbiguousContact { identity: String, count: usize },

    #[error("directory entry for {identity} has no chat handle")]
    MissingHandle { identity: String },

    #[error("directory query failed: {0}")]
    Backend(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum GeolocationError {
    #[error("failed to open geolocation database {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("not an IP address: {0}")]
    InvalidAddress(String),

    #[error("geolocation lookup for {address} failed: {source}")]
    Lookup {
        address: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render template: {0}")]
    Render(#[from] minijinja::Error),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("chat request failed: {0}")]
    Transport(#[source] BoxError),

    #[error("chat API answered HTTP {0}")]
    Status(u16),

    #[error("chat API rejected the message: {0}")]
    Api(String),
}
