//! # stashdb store
//!
//! A promise-style storage-access layer over the stashdb engine.
//!
//! This crate provides:
//! - [`Storage`]: engine ownership, setup bootstrap, and readiness
//!   signalling for config-less callers
//! - Connection management with idempotent schema application on version
//!   increase
//! - [`create_transaction`]: validated, single-store units of work
//! - [`Actions`]: typed CRUD and index-lookup operations, one engine
//!   request per operation
//!
//! # Usage
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use stashdb_store::{Engine, SchemaConfig, Storage, StoreSchema};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Todo {
//!     id: Option<i64>,
//!     description: String,
//!     done: bool,
//! }
//!
//! # async fn run() -> stashdb_store::StoreResult<()> {
//! let storage = Storage::new(Engine::open_dir("todo_data")?);
//! storage
//!     .setup(SchemaConfig::new("todo-db", 1).store(StoreSchema::new("todolist", "id", true)))
//!     .await?;
//!
//! let todos = storage.actions::<Todo>("todolist");
//! let key = todos
//!     .add(&Todo { id: None, description: "buy milk".into(), done: false }, None)
//!     .await?;
//! let stored = todos.get_by_id(key).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod actions;
mod config;
mod connection;
mod error;
mod storage;
mod transaction;

pub use actions::{Actions, TypedCursor};
pub use config::{IndexOptions, IndexSchema, KeySpec, SchemaConfig, StoreSchema, WaitOptions};
pub use error::{StoreError, StoreResult};
pub use storage::Storage;
pub use transaction::create_transaction;

// Engine surface the layer's callers interact with.
pub use stashdb_engine::{
    Cursor, Database, Engine, EngineError, Key, KeyRange, TransactionMode, Value,
};
