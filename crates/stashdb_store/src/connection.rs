//! Connection acquisition and idempotent schema application.

use crate::config::SchemaConfig;
use crate::error::{StoreError, StoreResult};
use stashdb_engine::{Database, Engine, EngineResult, Upgrade};

/// Opens the configured database, applying its schema on version increase.
///
/// Any engine-side rejection of the open request (version conflict, lock
/// contention, unreadable snapshot) surfaces as [`StoreError::Connection`].
pub(crate) fn open(engine: &Engine, config: &SchemaConfig) -> StoreResult<Database> {
    engine
        .open(&config.database_name, config.version, |upgrade| {
            apply_schema(upgrade, config)
        })
        .map_err(|error| StoreError::connection(error.to_string()))
}

/// Creates declared stores and indices that do not already exist.
///
/// Existing stores are never dropped or recreated, so re-running on a
/// version bump is safe.
fn apply_schema(upgrade: &mut Upgrade<'_>, config: &SchemaConfig) -> EngineResult<()> {
    for declared in &config.stores {
        let store = match upgrade.store(&declared.name) {
            Some(store) => store,
            None => upgrade.create_store(&declared.name, declared.params())?,
        };
        for index in &declared.indices {
            if !store.contains_index(&index.name) {
                store.create_index(index.params())?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexSchema, StoreSchema};

    fn todolist_config(version: u32) -> SchemaConfig {
        SchemaConfig::new("todo-db", version).store(StoreSchema::new("todolist", "id", true))
    }

    #[test]
    fn open_creates_declared_schema() {
        let engine = Engine::in_memory();
        let db = open(&engine, &todolist_config(1)).unwrap();
        assert!(db.contains_store("todolist"));
        assert_eq!(db.version(), 1);
    }

    #[test]
    fn version_bump_adds_missing_pieces_only() {
        let engine = Engine::in_memory();
        open(&engine, &todolist_config(1)).unwrap();

        // Same store plus a new index and a new store at version 2.
        let expanded = SchemaConfig::new("todo-db", 2)
            .store(StoreSchema::new("todolist", "id", true).index(IndexSchema::new("by_owner", "owner")))
            .store(StoreSchema::new("archive", "id", false));
        let db = open(&engine, &expanded).unwrap();

        assert!(db.contains_store("todolist"));
        assert!(db.contains_store("archive"));
        assert_eq!(db.version(), 2);

        // Re-opening with the same expanded config is a no-op.
        let db = open(&engine, &expanded).unwrap();
        assert_eq!(db.store_names().len(), 2);
    }

    #[test]
    fn version_downgrade_is_a_connection_error() {
        let engine = Engine::in_memory();
        open(&engine, &todolist_config(2)).unwrap();
        let result = open(&engine, &todolist_config(1));
        assert!(matches!(result, Err(StoreError::Connection { .. })));
    }
}
