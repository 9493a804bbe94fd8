//! Transaction helper: validated, single-store units of work.

use crate::error::{StoreError, StoreResult};
use stashdb_engine::{Database, Transaction, TransactionMode};

/// Validates the handle and target store, then opens a transaction.
///
/// Validation failure short-circuits: no engine request is issued for a
/// connection that is closed or a store that does not exist.
///
/// # Errors
///
/// Fails with [`StoreError::NotConnected`] if the handle is closed, or
/// [`StoreError::StoreNotFound`] if the store is absent from the handle's
/// schema.
pub fn create_transaction(
    db: &Database,
    mode: TransactionMode,
    store: &str,
) -> StoreResult<Transaction> {
    if !db.is_open() {
        return Err(StoreError::NotConnected);
    }
    if !db.contains_store(store) {
        return Err(StoreError::StoreNotFound {
            name: store.to_string(),
        });
    }
    db.transaction(store, mode).map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SchemaConfig, StoreSchema};
    use crate::connection;
    use stashdb_engine::Engine;

    fn open_db() -> Database {
        let engine = Engine::in_memory();
        let config =
            SchemaConfig::new("todo-db", 1).store(StoreSchema::new("todolist", "id", true));
        connection::open(&engine, &config).unwrap()
    }

    #[test]
    fn valid_handle_and_store_opens() {
        let db = open_db();
        let txn = create_transaction(&db, TransactionMode::ReadOnly, "todolist");
        assert!(txn.is_ok());
    }

    #[test]
    fn closed_handle_is_not_connected() {
        let db = open_db();
        db.close();
        let result = create_transaction(&db, TransactionMode::ReadOnly, "todolist");
        assert!(matches!(result, Err(StoreError::NotConnected)));
    }

    #[test]
    fn unknown_store_is_reported() {
        let db = open_db();
        let result = create_transaction(&db, TransactionMode::ReadOnly, "unknown");
        assert!(matches!(
            result,
            Err(StoreError::StoreNotFound { name }) if name == "unknown"
        ));
    }
}
