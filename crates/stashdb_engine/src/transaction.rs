//! Single-store transactions.

use crate::cursor::Cursor;
use crate::error::{EngineError, EngineResult};
use crate::key::{Key, KeyRange};
use crate::store::ObjectStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Access mode for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Reads only; may run concurrently with other read-only transactions.
    ReadOnly,
    /// Reads and writes; exclusive per store.
    ReadWrite,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Active,
    Committed,
    Aborted,
}

/// Persistence hook invoked when a dirty transaction commits.
pub(crate) type Writeback = Arc<dyn Fn() -> EngineResult<()> + Send + Sync>;

/// A unit of work bound to one object store.
///
/// A transaction issues operations directly against its store; the store
/// is snapshotted before the first write so that a failed operation, or an
/// explicit [`abort`], restores the state the transaction started from.
/// A failed operation aborts the whole transaction.
///
/// Dropping a dirty, still-active transaction commits it.
///
/// [`abort`]: Transaction::abort
pub struct Transaction {
    store: Arc<RwLock<ObjectStore>>,
    mode: TransactionMode,
    state: TransactionState,
    dirty: bool,
    backup: Option<ObjectStore>,
    writeback: Option<Writeback>,
}

impl Transaction {
    pub(crate) fn new(
        store: Arc<RwLock<ObjectStore>>,
        mode: TransactionMode,
        writeback: Option<Writeback>,
    ) -> Self {
        Self {
            store,
            mode,
            state: TransactionState::Active,
            dirty: false,
            backup: None,
            writeback,
        }
    }

    /// Returns the transaction's access mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Whether the transaction can still issue operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn ensure_active(&self) -> EngineResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(EngineError::TransactionFinished)
        }
    }

    /// Gets a record by primary key.
    pub fn get(&self, key: &Key) -> EngineResult<Option<Value>> {
        self.ensure_active()?;
        Ok(self.store.read().get(key))
    }

    /// Gets all records, optionally restricted to a key range, in key order.
    pub fn get_all(&self, range: Option<&KeyRange>) -> EngineResult<Vec<Value>> {
        self.ensure_active()?;
        Ok(self.store.read().get_all(range))
    }

    /// Gets the first record whose `index` key equals `key`.
    pub fn index_get(&self, index: &str, key: &Key) -> EngineResult<Option<Value>> {
        self.ensure_active()?;
        self.store.read().index_get(index, key)
    }

    /// Gets all records whose `index` key equals `key`.
    pub fn index_get_all(&self, index: &str, key: &Key) -> EngineResult<Vec<Value>> {
        self.ensure_active()?;
        self.store.read().index_get_all(index, key)
    }

    /// Iterates records in key order, invoking `visit` once per record.
    ///
    /// See [`Cursor`] for the iteration contract.
    pub fn open_cursor<F>(&self, range: Option<&KeyRange>, mut visit: F) -> EngineResult<()>
    where
        F: FnMut(&mut Cursor<'_>),
    {
        self.ensure_active()?;
        let entries = self.store.read().entries_in(range);
        for (key, value) in &entries {
            let mut cursor = Cursor::positioned(key, value);
            visit(&mut cursor);
            if !cursor.advanced() {
                return Ok(());
            }
        }
        let mut cursor = Cursor::exhausted();
        visit(&mut cursor);
        Ok(())
    }

    /// Inserts a record, failing if its key already exists.
    pub fn add(&mut self, value: Value, key: Option<Key>) -> EngineResult<Key> {
        self.write_op(|store| store.add(value, key))
    }

    /// Inserts or replaces a record.
    pub fn put(&mut self, value: Value, key: Option<Key>) -> EngineResult<Key> {
        self.write_op(|store| store.put(value, key))
    }

    /// Deletes a record by primary key. Absent keys are a no-op.
    pub fn delete(&mut self, key: &Key) -> EngineResult<()> {
        self.write_op(|store| {
            store.delete(key);
            Ok(())
        })
    }

    /// Deletes every record in the store.
    pub fn clear(&mut self) -> EngineResult<()> {
        self.write_op(|store| {
            store.clear();
            Ok(())
        })
    }

    /// Commits the transaction, persisting writes if the engine is
    /// directory-backed.
    pub fn commit(&mut self) -> EngineResult<()> {
        self.ensure_active()?;
        self.state = TransactionState::Committed;
        self.backup = None;
        if self.dirty {
            if let Some(writeback) = &self.writeback {
                writeback()?;
            }
        }
        Ok(())
    }

    /// Aborts the transaction, restoring the store to its state at the
    /// transaction's first write.
    pub fn abort(&mut self) -> EngineResult<()> {
        self.ensure_active()?;
        if let Some(backup) = self.backup.take() {
            *self.store.write() = backup;
        }
        self.state = TransactionState::Aborted;
        Ok(())
    }

    fn write_op<T>(
        &mut self,
        op: impl FnOnce(&mut ObjectStore) -> EngineResult<T>,
    ) -> EngineResult<T> {
        self.ensure_active()?;
        if self.mode != TransactionMode::ReadWrite {
            return Err(EngineError::ReadOnlyTransaction);
        }
        let mut guard = self.store.write();
        if self.backup.is_none() {
            self.backup = Some(guard.clone());
        }
        match op(&mut guard) {
            Ok(result) => {
                self.dirty = true;
                Ok(result)
            }
            Err(error) => {
                if let Some(backup) = self.backup.take() {
                    *guard = backup;
                }
                self.state = TransactionState::Aborted;
                Err(error)
            }
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() && self.dirty {
            let _ = self.commit();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("store", &self.store.read().name())
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreParams;
    use serde_json::json;

    fn store() -> Arc<RwLock<ObjectStore>> {
        Arc::new(RwLock::new(ObjectStore::new(
            "todolist",
            StoreParams {
                key_path: "id".to_string(),
                auto_increment: true,
            },
        )))
    }

    #[test]
    fn read_only_rejects_writes() {
        let mut txn = Transaction::new(store(), TransactionMode::ReadOnly, None);
        let result = txn.add(json!({"description": "a"}), None);
        assert!(matches!(result, Err(EngineError::ReadOnlyTransaction)));
        // A mode violation does not abort the transaction.
        assert!(txn.is_active());
    }

    #[test]
    fn write_then_read_back() {
        let store = store();
        let mut txn = Transaction::new(Arc::clone(&store), TransactionMode::ReadWrite, None);
        let key = txn.add(json!({"description": "a"}), None).unwrap();
        assert!(txn.get(&key).unwrap().is_some());
        txn.commit().unwrap();
    }

    #[test]
    fn failed_operation_aborts_and_rolls_back() {
        let store = store();
        let mut txn = Transaction::new(Arc::clone(&store), TransactionMode::ReadWrite, None);
        txn.add(json!({"id": 1, "v": "a"}), None).unwrap();
        let result = txn.add(json!({"id": 1, "v": "b"}), None);
        assert!(matches!(
            result,
            Err(EngineError::ConstraintViolation { .. })
        ));
        assert!(!txn.is_active());
        // The first write of the same transaction rolled back too.
        assert_eq!(store.read().len(), 0);
    }

    #[test]
    fn abort_restores_initial_state() {
        let store = store();
        {
            let mut txn = Transaction::new(Arc::clone(&store), TransactionMode::ReadWrite, None);
            txn.add(json!({"v": "seed"}), None).unwrap();
            txn.commit().unwrap();
        }
        let mut txn = Transaction::new(Arc::clone(&store), TransactionMode::ReadWrite, None);
        txn.clear().unwrap();
        txn.abort().unwrap();
        assert_eq!(store.read().len(), 1);
    }

    #[test]
    fn finished_transaction_rejects_operations() {
        let mut txn = Transaction::new(store(), TransactionMode::ReadWrite, None);
        txn.commit().unwrap();
        assert!(matches!(
            txn.get(&Key::Int(1)),
            Err(EngineError::TransactionFinished)
        ));
        assert!(matches!(
            txn.commit(),
            Err(EngineError::TransactionFinished)
        ));
    }

    #[test]
    fn commit_runs_writeback_only_when_dirty() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let writeback: Writeback = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let store = store();
        let mut read = Transaction::new(
            Arc::clone(&store),
            TransactionMode::ReadOnly,
            Some(Arc::clone(&writeback)),
        );
        read.commit().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut write = Transaction::new(store, TransactionMode::ReadWrite, Some(writeback));
        write.add(json!({"v": 1}), None).unwrap();
        write.commit().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_commits_dirty_transaction() {
        let store = store();
        {
            let mut txn = Transaction::new(Arc::clone(&store), TransactionMode::ReadWrite, None);
            txn.add(json!({"v": 1}), None).unwrap();
        }
        assert_eq!(store.read().len(), 1);
    }

    #[test]
    fn cursor_visits_in_key_order_until_not_advanced() {
        let store = store();
        let mut txn = Transaction::new(Arc::clone(&store), TransactionMode::ReadWrite, None);
        for i in 1..=4 {
            txn.add(json!({"id": i}), None).unwrap();
        }

        let mut seen = Vec::new();
        txn.open_cursor(None, |cursor| {
            if let Some(value) = cursor.value() {
                seen.push(value["id"].clone());
                if seen.len() < 2 {
                    cursor.advance();
                }
            }
        })
        .unwrap();
        assert_eq!(seen, vec![json!(1), json!(2)]);
    }

    #[test]
    fn cursor_signals_exhaustion() {
        let store = store();
        let mut txn = Transaction::new(Arc::clone(&store), TransactionMode::ReadWrite, None);
        txn.add(json!({"id": 1}), None).unwrap();

        let mut finished = false;
        txn.open_cursor(None, |cursor| {
            if cursor.done() {
                finished = true;
            } else {
                cursor.advance();
            }
        })
        .unwrap();
        assert!(finished);
    }
}
