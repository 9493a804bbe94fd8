//! Error types for storage operations.

use stashdb_engine::EngineError;
use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage-access layer.
///
/// Failures reject the enclosing operation's result; the layer performs no
/// recovery or retry. Callers decide whether to surface or ignore them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine rejected the open request.
    #[error("connection failed: {message}")]
    Connection {
        /// Description of the rejection.
        message: String,
    },

    /// An operation reached a closed connection handle.
    #[error("queried before opening connection")]
    NotConnected,

    /// The named store is absent from the database schema.
    #[error("store {name} not found")]
    StoreNotFound {
        /// Name of the store.
        name: String,
    },

    /// The readiness wait exceeded its deadline.
    #[error("storage setup did not complete within {waited:?}")]
    Timeout {
        /// How long the operation waited.
        waited: Duration,
    },

    /// Entity encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// An engine failure, surfaced verbatim.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl StoreError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}
