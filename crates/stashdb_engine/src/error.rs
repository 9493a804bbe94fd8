//! Error types for engine operations.

use crate::key::Key;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Another process holds the engine directory lock.
    #[error("engine directory locked: another process has exclusive access")]
    Locked,

    /// The database handle has been closed.
    #[error("database is closed")]
    Closed,

    /// The transaction has already committed or aborted.
    #[error("transaction is no longer active")]
    TransactionFinished,

    /// The requested version is below the stored version.
    #[error("version conflict: requested v{requested}, stored v{current}")]
    VersionError {
        /// The version passed to `open`.
        requested: u32,
        /// The version currently on disk or in memory.
        current: u32,
    },

    /// A store with this name already exists.
    #[error("store already exists: {name}")]
    StoreExists {
        /// Name of the store.
        name: String,
    },

    /// No store with this name exists.
    #[error("store not found: {name}")]
    StoreNotFound {
        /// Name of the store.
        name: String,
    },

    /// An index with this name already exists on the store.
    #[error("index already exists: {name}")]
    IndexExists {
        /// Name of the index.
        name: String,
    },

    /// No index with this name exists on the store.
    #[error("index not found: {name}")]
    IndexNotFound {
        /// Name of the index.
        name: String,
    },

    /// A key or unique-index constraint was violated.
    #[error("constraint violation: key {key} already exists")]
    ConstraintViolation {
        /// The conflicting key.
        key: Key,
    },

    /// A write operation was issued on a read-only transaction.
    #[error("write operation on read-only transaction")]
    ReadOnlyTransaction,

    /// A key could not be resolved or injected for a record.
    #[error("key error: {message}")]
    KeyError {
        /// Description of the problem.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A snapshot file is corrupted or could not be encoded.
    #[error("snapshot error: {message}")]
    Snapshot {
        /// Description of the problem.
        message: String,
    },
}

impl EngineError {
    /// Creates a key error.
    pub fn key_error(message: impl Into<String>) -> Self {
        Self::KeyError {
            message: message.into(),
        }
    }

    /// Creates a snapshot error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }
}
