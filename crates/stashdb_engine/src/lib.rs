//! # stashdb engine
//!
//! A transactional key-value engine for stashdb.
//!
//! This crate provides:
//! - Named, versioned databases opened through an upgrade hook
//! - Object stores with in-line primary keys and key generators
//! - Secondary indices with optional uniqueness
//! - Single-store read-only / read-write transactions
//! - Cursor iteration in key order
//! - Snapshot persistence for directory-backed engines
//!
//! Records are free-form JSON objects ([`Value`]); primary and index keys
//! are integers or text ([`Key`]). The promise-style access layer lives in
//! the `stashdb_store` crate; this crate is its storage substrate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod database;
mod engine;
mod error;
mod key;
mod snapshot;
mod store;
mod transaction;

pub use cursor::Cursor;
pub use database::{Database, Upgrade, UpgradeStore};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use key::{Key, KeyRange};
pub use store::{IndexParams, StoreParams};
pub use transaction::{Transaction, TransactionMode};

/// Record value type: a free-form JSON object.
pub type Value = serde_json::Value;
