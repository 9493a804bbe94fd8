//! Database handles and upgrade contexts.

use crate::error::{EngineError, EngineResult};
use crate::snapshot;
use crate::store::{IndexParams, ObjectStore, StoreParams};
use crate::transaction::{Transaction, TransactionMode, Writeback};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

pub(crate) type StoreMap = BTreeMap<String, Arc<RwLock<ObjectStore>>>;

/// Shared state of one named database.
pub(crate) struct DatabaseInner {
    name: String,
    version: RwLock<u32>,
    stores: RwLock<StoreMap>,
    /// Persistence hook for directory-backed engines. `None` in memory.
    writeback: Option<Writeback>,
}

impl DatabaseInner {
    /// Creates an empty database at version 0 (never opened before).
    pub(crate) fn new(name: &str, dir: Option<PathBuf>) -> Arc<Self> {
        Self::from_parts(name.to_string(), 0, Vec::new(), dir)
    }

    /// Assembles a database from its snapshot parts.
    pub(crate) fn from_parts(
        name: String,
        version: u32,
        stores: Vec<ObjectStore>,
        dir: Option<PathBuf>,
    ) -> Arc<Self> {
        let stores: StoreMap = stores
            .into_iter()
            .map(|store| (store.name().to_string(), Arc::new(RwLock::new(store))))
            .collect();

        Arc::new_cyclic(|weak: &Weak<DatabaseInner>| {
            let writeback: Option<Writeback> = dir.map(|dir| {
                let weak = weak.clone();
                let writeback: Writeback = Arc::new(move || match weak.upgrade() {
                    Some(db) => snapshot::save(&dir, &db),
                    None => Ok(()),
                });
                writeback
            });
            DatabaseInner {
                name,
                version: RwLock::new(version),
                stores: RwLock::new(stores),
                writeback,
            }
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn version(&self) -> u32 {
        *self.version.read()
    }

    pub(crate) fn set_version(&self, version: u32) {
        *self.version.write() = version;
    }

    pub(crate) fn store(&self, name: &str) -> Option<Arc<RwLock<ObjectStore>>> {
        self.stores.read().get(name).cloned()
    }

    pub(crate) fn contains_store(&self, name: &str) -> bool {
        self.stores.read().contains_key(name)
    }

    pub(crate) fn store_names(&self) -> Vec<String> {
        self.stores.read().keys().cloned().collect()
    }

    pub(crate) fn writeback(&self) -> Option<Writeback> {
        self.writeback.clone()
    }

    /// Deep copy of the store map, for upgrade rollback.
    pub(crate) fn schema_snapshot(&self) -> StoreMap {
        self.stores
            .read()
            .iter()
            .map(|(name, store)| (name.clone(), Arc::new(RwLock::new(store.read().clone()))))
            .collect()
    }

    pub(crate) fn restore_schema(&self, stores: StoreMap) {
        *self.stores.write() = stores;
    }

    /// Clones out the parts a snapshot persists.
    pub(crate) fn snapshot_parts(&self) -> (String, u32, Vec<ObjectStore>) {
        let stores = self
            .stores
            .read()
            .values()
            .map(|store| store.read().clone())
            .collect();
        (self.name.clone(), self.version(), stores)
    }
}

/// A handle to an open database.
///
/// Handles are cheap to clone and share the underlying database. A handle
/// can be [`close`]d independently of the database itself; operations on a
/// closed handle fail with [`EngineError::Closed`]. Callers should not
/// assume a handle outlives the operation it was acquired for.
///
/// [`close`]: Database::close
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    open: Arc<RwLock<bool>>,
}

impl Database {
    pub(crate) fn from_inner(inner: Arc<DatabaseInner>) -> Self {
        Self {
            inner,
            open: Arc::new(RwLock::new(true)),
        }
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the database's current schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.inner.version()
    }

    /// Whether a store with this name exists in the schema.
    #[must_use]
    pub fn contains_store(&self, name: &str) -> bool {
        self.inner.contains_store(name)
    }

    /// Names of all stores in the schema.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.inner.store_names()
    }

    /// Whether this handle is still usable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.open.read()
    }

    /// Closes this handle. The database itself stays available to other
    /// handles.
    pub fn close(&self) {
        *self.open.write() = false;
    }

    /// Starts a transaction bound to one store.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::Closed`] if the handle was closed, or
    /// [`EngineError::StoreNotFound`] if the store is not in the schema.
    pub fn transaction(&self, store: &str, mode: TransactionMode) -> EngineResult<Transaction> {
        if !self.is_open() {
            return Err(EngineError::Closed);
        }
        let store = self
            .inner
            .store(store)
            .ok_or_else(|| EngineError::StoreNotFound {
                name: store.to_string(),
            })?;
        Ok(Transaction::new(store, mode, self.inner.writeback()))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// Schema-creation context passed to the upgrade callback.
///
/// Stores and indices can only be created here; the engine invokes the
/// callback exactly once per version increase.
pub struct Upgrade<'a> {
    db: &'a DatabaseInner,
}

impl<'a> Upgrade<'a> {
    pub(crate) fn new(db: &'a DatabaseInner) -> Self {
        Self { db }
    }

    /// Whether a store with this name already exists.
    #[must_use]
    pub fn contains_store(&self, name: &str) -> bool {
        self.db.contains_store(name)
    }

    /// Returns a handle to an existing store, for adding indices.
    #[must_use]
    pub fn store(&self, name: &str) -> Option<UpgradeStore> {
        self.db.store(name).map(|store| UpgradeStore { store })
    }

    /// Creates a store.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::StoreExists`] if the name is taken.
    pub fn create_store(&mut self, name: &str, params: StoreParams) -> EngineResult<UpgradeStore> {
        let mut stores = self.db.stores.write();
        if stores.contains_key(name) {
            return Err(EngineError::StoreExists {
                name: name.to_string(),
            });
        }
        tracing::debug!(database = self.db.name(), store = name, "creating store");
        let store = Arc::new(RwLock::new(ObjectStore::new(name, params)));
        stores.insert(name.to_string(), Arc::clone(&store));
        Ok(UpgradeStore { store })
    }
}

/// A store handle valid during an upgrade callback, for index creation.
pub struct UpgradeStore {
    store: Arc<RwLock<ObjectStore>>,
}

impl UpgradeStore {
    /// Whether an index with this name already exists.
    #[must_use]
    pub fn contains_index(&self, name: &str) -> bool {
        self.store.read().contains_index(name)
    }

    /// Creates a secondary index, backfilling it from existing records.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::IndexExists`] if the name is taken, or
    /// [`EngineError::ConstraintViolation`] if a unique index cannot be
    /// built over the existing records.
    pub fn create_index(&self, params: IndexParams) -> EngineResult<()> {
        tracing::debug!(
            store = %self.store.read().name(),
            index = %params.name,
            "creating index"
        );
        self.store.write().create_index(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> StoreParams {
        StoreParams {
            key_path: "id".to_string(),
            auto_increment: true,
        }
    }

    #[test]
    fn closed_handle_rejects_transactions() {
        let inner = DatabaseInner::new("test", None);
        let db = Database::from_inner(inner);
        db.close();
        assert!(!db.is_open());
        let result = db.transaction("todolist", TransactionMode::ReadOnly);
        assert!(matches!(result, Err(EngineError::Closed)));
    }

    #[test]
    fn close_is_per_handle() {
        let inner = DatabaseInner::new("test", None);
        let first = Database::from_inner(Arc::clone(&inner));
        let second = Database::from_inner(inner);
        first.close();
        assert!(!first.is_open());
        assert!(second.is_open());
    }

    #[test]
    fn missing_store_is_reported() {
        let inner = DatabaseInner::new("test", None);
        let db = Database::from_inner(inner);
        let result = db.transaction("nope", TransactionMode::ReadOnly);
        assert!(matches!(result, Err(EngineError::StoreNotFound { .. })));
    }

    #[test]
    fn upgrade_creates_stores_and_indices() {
        let inner = DatabaseInner::new("test", None);
        {
            let mut upgrade = Upgrade::new(&inner);
            assert!(!upgrade.contains_store("todolist"));
            let store = upgrade.create_store("todolist", params()).unwrap();
            store
                .create_index(IndexParams {
                    name: "by_owner".to_string(),
                    key_path: "owner".to_string(),
                    unique: false,
                })
                .unwrap();
            assert!(store.contains_index("by_owner"));
        }

        let db = Database::from_inner(inner);
        assert!(db.contains_store("todolist"));
        assert_eq!(db.store_names(), vec!["todolist".to_string()]);
    }

    #[test]
    fn duplicate_store_name_fails() {
        let inner = DatabaseInner::new("test", None);
        let mut upgrade = Upgrade::new(&inner);
        upgrade.create_store("todolist", params()).unwrap();
        let result = upgrade.create_store("todolist", params());
        assert!(matches!(result, Err(EngineError::StoreExists { .. })));
    }

    #[test]
    fn transactions_reach_the_store() {
        let inner = DatabaseInner::new("test", None);
        Upgrade::new(&inner).create_store("todolist", params()).unwrap();
        let db = Database::from_inner(inner);

        let mut txn = db
            .transaction("todolist", TransactionMode::ReadWrite)
            .unwrap();
        let key = txn.add(json!({"description": "buy milk"}), None).unwrap();
        txn.commit().unwrap();

        let txn = db
            .transaction("todolist", TransactionMode::ReadOnly)
            .unwrap();
        let record = txn.get(&key).unwrap().unwrap();
        assert_eq!(record["description"], json!("buy milk"));
    }

    #[test]
    fn schema_rollback_discards_new_stores() {
        let inner = DatabaseInner::new("test", None);
        Upgrade::new(&inner).create_store("keep", params()).unwrap();

        let rollback = inner.schema_snapshot();
        Upgrade::new(&inner).create_store("discard", params()).unwrap();
        inner.restore_schema(rollback);

        assert!(inner.contains_store("keep"));
        assert!(!inner.contains_store("discard"));
    }
}
