//! The engine: a registry of named, versioned databases.

use crate::database::{Database, DatabaseInner, Upgrade};
use crate::error::{EngineError, EngineResult};
use crate::snapshot;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE: &str = "LOCK";

/// The storage engine.
///
/// An `Engine` owns a set of named databases and hands out [`Database`]
/// handles through [`open`]. It is cheap to clone and safe to share across
/// threads.
///
/// # Persistence
///
/// [`Engine::in_memory`] keeps everything in process memory.
/// [`Engine::open_dir`] roots the engine at a directory, holds an exclusive
/// advisory lock on it, and persists each database as a snapshot file that
/// is rewritten after every committed read-write transaction.
///
/// # Example
///
/// ```rust
/// use stashdb_engine::{Engine, StoreParams, TransactionMode};
///
/// let engine = Engine::in_memory();
/// let db = engine.open("app", 1, |upgrade| {
///     upgrade.create_store(
///         "todolist",
///         StoreParams { key_path: "id".into(), auto_increment: true },
///     )?;
///     Ok(())
/// })?;
///
/// let mut txn = db.transaction("todolist", TransactionMode::ReadWrite)?;
/// txn.add(serde_json::json!({"description": "buy milk"}), None)?;
/// txn.commit()?;
/// # Ok::<(), stashdb_engine::EngineError>(())
/// ```
///
/// [`open`]: Engine::open
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    dir: Option<EngineDir>,
    databases: Mutex<HashMap<String, Arc<DatabaseInner>>>,
}

struct EngineDir {
    path: PathBuf,
    /// Held for the lifetime of the engine.
    _lock_file: File,
}

impl Engine {
    /// Creates an ephemeral in-memory engine.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                dir: None,
                databases: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Opens a persistent engine rooted at `path`.
    ///
    /// The directory is created if missing. An exclusive advisory lock is
    /// taken on a `LOCK` file inside it and held until the engine is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::Locked`] if another process holds the
    /// lock, or with an I/O error.
    pub fn open_dir(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(EngineError::Locked);
        }

        tracing::debug!(path = %path.display(), "engine directory opened");
        Ok(Self {
            inner: Arc::new(EngineInner {
                dir: Some(EngineDir {
                    path: path.to_path_buf(),
                    _lock_file: lock_file,
                }),
                databases: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Opens the named database at `version`.
    ///
    /// If `version` is above the database's current version, `upgrade` runs
    /// exactly once before the handle is returned; it is the only place
    /// stores and indices can be created. If the callback fails, the schema
    /// is rolled back and the version is left unchanged.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::VersionError`] if `version` is below the
    /// stored version, or with whatever the upgrade callback returns.
    pub fn open<F>(&self, name: &str, version: u32, upgrade: F) -> EngineResult<Database>
    where
        F: FnOnce(&mut Upgrade<'_>) -> EngineResult<()>,
    {
        // The registry lock is held across the upgrade so concurrent opens
        // of the same database observe it at most once.
        let mut databases = self.inner.databases.lock();

        let db = match databases.get(name) {
            Some(db) => Arc::clone(db),
            None => {
                let loaded = match &self.inner.dir {
                    Some(dir) => snapshot::load(&dir.path, name)?,
                    None => None,
                };
                let db = loaded.unwrap_or_else(|| {
                    DatabaseInner::new(name, self.inner.dir.as_ref().map(|d| d.path.clone()))
                });
                databases.insert(name.to_string(), Arc::clone(&db));
                db
            }
        };

        let current = db.version();
        if version < current {
            return Err(EngineError::VersionError {
                requested: version,
                current,
            });
        }
        if version > current {
            tracing::debug!(
                database = name,
                from = current,
                to = version,
                "running upgrade callback"
            );
            let rollback = db.schema_snapshot();
            let mut context = Upgrade::new(&db);
            if let Err(error) = upgrade(&mut context) {
                db.restore_schema(rollback);
                return Err(error);
            }
            db.set_version(version);
            if let Some(dir) = &self.inner.dir {
                snapshot::save(&dir.path, &db)?;
            }
        }

        Ok(Database::from_inner(db))
    }

    /// Persists every open database (directory-backed engines only).
    pub fn flush(&self) -> EngineResult<()> {
        let Some(dir) = &self.inner.dir else {
            return Ok(());
        };
        let databases = self.inner.databases.lock();
        for db in databases.values() {
            snapshot::save(&dir.path, db)?;
        }
        Ok(())
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        let Some(dir) = &self.dir else {
            return;
        };
        let databases = self.databases.lock();
        for db in databases.values() {
            if let Err(error) = snapshot::save(&dir.path, db) {
                tracing::warn!(database = db.name(), error = %error, "final snapshot failed");
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field(
                "dir",
                &self.inner.dir.as_ref().map(|dir| dir.path.display().to_string()),
            )
            .field("databases", &self.inner.databases.lock().len())
            .finish()
    }
}
