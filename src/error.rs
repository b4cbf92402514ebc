//! Error types for gateway operations

use thiserror::Error;

/// Result type for object store calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors reported by an [`ObjectStore`](crate::store::ObjectStore)
#[derive(Error, Debug)]
pub enum StoreError {
    /// Object does not exist
    #[error("Object does not exist: {0}")]
    NotFound(String),

    /// Store unreachable or request rejected
    #[error("Transport error: {0}")]
    Transport(String),

    /// Key cannot be mapped onto the store
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Absence is an expected outcome, not a failure
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Errors reported by a [`ShardStore`](crate::cache::ShardStore)
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backing cache refused the write
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// Shard could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to gateway callers
///
/// Only primary-store failures and configuration problems reach the caller.
/// Cache, retention and mirror failures are logged and absorbed.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Primary store failed for a reason other than absence
    #[error("Primary store failed on '{key}': {source}")]
    Transport {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    pub(crate) fn transport(key: impl Into<String>, source: StoreError) -> Self {
        GatewayError::Transport {
            key: key.into(),
            source,
        }
    }
}
