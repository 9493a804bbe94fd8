//! Typed CRUD and query operations bound to one store.

use crate::config::SchemaConfig;
use crate::error::{StoreError, StoreResult};
use crate::storage::Storage;
use crate::transaction::create_transaction;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stashdb_engine::{Database, Key, KeyRange, TransactionMode, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// A fixed set of operations bound to one named store.
///
/// Obtained from [`Storage::actions`] (operations wait on readiness) or
/// [`Storage::actions_with`] (operations carry their own config and never
/// wait). Every operation acquires a fresh connection, validates it, opens
/// a single-operation transaction in the minimal required mode, and issues
/// exactly one engine request.
///
/// `T` is the entity type, encoded to and decoded from the engine's JSON
/// records through serde; it defaults to the raw [`Value`].
pub struct Actions<T = Value> {
    storage: Storage,
    store: String,
    config: Option<Arc<SchemaConfig>>,
    _marker: PhantomData<T>,
}

impl<T> Clone for Actions<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Actions<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actions")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<T> Actions<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(storage: Storage, store: String, config: Option<Arc<SchemaConfig>>) -> Self {
        Self {
            storage,
            store,
            config,
            _marker: PhantomData,
        }
    }

    /// Name of the store this instance operates on.
    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    async fn connect(&self) -> StoreResult<Database> {
        self.storage.connection(self.config.as_deref()).await
    }

    fn decode(value: Value) -> StoreResult<T> {
        serde_json::from_value(value).map_err(StoreError::from)
    }

    /// Looks up an entity by primary key.
    pub async fn get_by_id(&self, id: impl Into<Key>) -> StoreResult<Option<T>> {
        let db = self.connect().await?;
        let txn = create_transaction(&db, TransactionMode::ReadOnly, &self.store)?;
        txn.get(&id.into())?.map(Self::decode).transpose()
    }

    /// Returns the first entity whose `index` key equals `key`.
    pub async fn get_one_by_key(&self, index: &str, key: impl Into<Key>) -> StoreResult<Option<T>> {
        let db = self.connect().await?;
        let txn = create_transaction(&db, TransactionMode::ReadOnly, &self.store)?;
        txn.index_get(index, &key.into())?
            .map(Self::decode)
            .transpose()
    }

    /// Returns every entity whose `index` key equals `key`.
    pub async fn get_many_by_key(&self, index: &str, key: impl Into<Key>) -> StoreResult<Vec<T>> {
        let db = self.connect().await?;
        let txn = create_transaction(&db, TransactionMode::ReadOnly, &self.store)?;
        txn.index_get_all(index, &key.into())?
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    /// Returns every entity, in the engine's key order.
    pub async fn get_all(&self) -> StoreResult<Vec<T>> {
        let db = self.connect().await?;
        let txn = create_transaction(&db, TransactionMode::ReadOnly, &self.store)?;
        txn.get_all(None)?.into_iter().map(Self::decode).collect()
    }

    /// Inserts an entity and resolves with its assigned key.
    ///
    /// Fails with the engine's constraint error if the key (or a unique
    /// index key) already exists.
    pub async fn add(&self, entity: &T, key: Option<Key>) -> StoreResult<Key> {
        let db = self.connect().await?;
        let mut txn = create_transaction(&db, TransactionMode::ReadWrite, &self.store)?;
        let key = txn.add(serde_json::to_value(entity)?, key)?;
        txn.commit()?;
        Ok(key)
    }

    /// Inserts or replaces an entity and resolves with its key.
    pub async fn update(&self, entity: &T, key: Option<Key>) -> StoreResult<Key> {
        let db = self.connect().await?;
        let mut txn = create_transaction(&db, TransactionMode::ReadWrite, &self.store)?;
        let key = txn.put(serde_json::to_value(entity)?, key)?;
        txn.commit()?;
        Ok(key)
    }

    /// Deletes an entity by primary key. An absent id is a no-op.
    pub async fn delete_by_id(&self, id: impl Into<Key>) -> StoreResult<()> {
        let db = self.connect().await?;
        let mut txn = create_transaction(&db, TransactionMode::ReadWrite, &self.store)?;
        txn.delete(&id.into())?;
        txn.commit()?;
        Ok(())
    }

    /// Deletes every entity in the store.
    pub async fn delete_all(&self) -> StoreResult<()> {
        let db = self.connect().await?;
        let mut txn = create_transaction(&db, TransactionMode::ReadWrite, &self.store)?;
        txn.clear()?;
        txn.commit()?;
        Ok(())
    }

    /// Iterates entities in key order with a typed cursor.
    ///
    /// `visit` runs once per matching entity; iteration continues only if
    /// it calls [`TypedCursor::advance`]. After the last entity it runs one
    /// final time with an exhausted cursor ([`TypedCursor::done`]).
    pub async fn open_cursor<F>(&self, range: Option<&KeyRange>, mut visit: F) -> StoreResult<()>
    where
        F: FnMut(&mut TypedCursor<T>),
    {
        let db = self.connect().await?;
        let txn = create_transaction(&db, TransactionMode::ReadOnly, &self.store)?;

        let mut decode_error: Option<serde_json::Error> = None;
        txn.open_cursor(range, |cursor| {
            if decode_error.is_some() {
                return;
            }
            match (cursor.key(), cursor.value()) {
                (Some(key), Some(raw)) => match serde_json::from_value::<T>(raw.clone()) {
                    Ok(entity) => {
                        let mut typed = TypedCursor::positioned(key.clone(), entity);
                        visit(&mut typed);
                        if typed.advanced {
                            cursor.advance();
                        }
                    }
                    Err(error) => decode_error = Some(error),
                },
                _ => {
                    let mut typed = TypedCursor::exhausted();
                    visit(&mut typed);
                }
            }
        })?;

        match decode_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

/// A typed cursor position during [`Actions::open_cursor`] iteration.
#[derive(Debug)]
pub struct TypedCursor<T> {
    key: Option<Key>,
    value: Option<T>,
    advanced: bool,
}

impl<T> TypedCursor<T> {
    fn positioned(key: Key, value: T) -> Self {
        Self {
            key: Some(key),
            value: Some(value),
            advanced: false,
        }
    }

    fn exhausted() -> Self {
        Self {
            key: None,
            value: None,
            advanced: false,
        }
    }

    /// Primary key of the current entity, or `None` once exhausted.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// The current entity, or `None` once exhausted.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Whether iteration has moved past the last entity.
    #[must_use]
    pub fn done(&self) -> bool {
        self.value.is_none()
    }

    /// Requests the next entity. Has no effect on an exhausted cursor.
    pub fn advance(&mut self) {
        self.advanced = true;
    }
}
