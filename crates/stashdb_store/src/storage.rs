//! The storage handle: engine ownership and readiness signalling.

use crate::actions::Actions;
use crate::config::{SchemaConfig, WaitOptions};
use crate::connection;
use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use stashdb_engine::{Database, Engine};
use std::sync::Arc;
use tokio::sync::watch;

/// Entry point to the storage-access layer.
///
/// A `Storage` owns a reference to the engine together with the readiness
/// state the setup bootstrap publishes. It is cheap to clone; all clones
/// share the engine and the readiness channel, so one `setup` call unblocks
/// config-less operations everywhere.
///
/// # Example
///
/// ```rust,no_run
/// use stashdb_store::{Engine, SchemaConfig, Storage, StoreSchema};
///
/// # async fn run() -> stashdb_store::StoreResult<()> {
/// let storage = Storage::new(Engine::in_memory());
/// storage
///     .setup(SchemaConfig::new("todo-db", 1).store(StoreSchema::new("todolist", "id", true)))
///     .await?;
///
/// let todos = storage.actions::<serde_json::Value>("todolist");
/// let key = todos.add(&serde_json::json!({"description": "buy milk", "done": false}), None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Storage {
    engine: Arc<Engine>,
    wait: WaitOptions,
    sender: Arc<watch::Sender<Option<Arc<SchemaConfig>>>>,
    receiver: watch::Receiver<Option<Arc<SchemaConfig>>>,
}

impl Storage {
    /// Creates a storage handle with the default readiness wait.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        Self::with_options(engine, WaitOptions::default())
    }

    /// Creates a storage handle with custom wait options.
    #[must_use]
    pub fn with_options(engine: Engine, wait: WaitOptions) -> Self {
        let (sender, receiver) = watch::channel(None);
        Self {
            engine: Arc::new(engine),
            wait,
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Runs the one-time setup bootstrap.
    ///
    /// Opens a connection with `config` (creating declared stores and
    /// indices as needed), then publishes the config as the readiness
    /// state, unblocking config-less operations. On failure the error is
    /// logged and returned, readiness is not published, and config-less
    /// operations keep waiting until their timeout.
    pub async fn setup(&self, config: SchemaConfig) -> StoreResult<()> {
        let config = Arc::new(config);
        match connection::open(&self.engine, &config) {
            Ok(_) => {
                tracing::debug!(
                    database = %config.database_name,
                    version = config.version,
                    "storage ready"
                );
                self.sender.send_replace(Some(config));
                Ok(())
            }
            Err(error) => {
                tracing::error!(error = %error, "storage setup failed");
                Err(error)
            }
        }
    }

    /// Whether setup has published readiness.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Acquires a connection to the configured database.
    ///
    /// With a config, the open proceeds immediately. Without one, the call
    /// suspends until the setup bootstrap publishes its config, failing
    /// with [`StoreError::Timeout`] once the wait deadline passes.
    ///
    /// Handles are not guaranteed to be long-lived; request a fresh one per
    /// logical operation instead of caching it.
    pub async fn connection(&self, config: Option<&SchemaConfig>) -> StoreResult<Database> {
        match config {
            Some(config) => connection::open(&self.engine, config),
            None => {
                let config = self.wait_until_ready().await?;
                connection::open(&self.engine, &config)
            }
        }
    }

    /// Suspends until setup publishes a config, or the deadline passes.
    async fn wait_until_ready(&self) -> StoreResult<Arc<SchemaConfig>> {
        let waited = self.wait.timeout;
        let mut receiver = self.receiver.clone();
        let result =
            tokio::time::timeout(waited, receiver.wait_for(|config| config.is_some())).await;
        match result {
            Ok(Ok(published)) => published
                .clone()
                .ok_or_else(|| StoreError::connection("readiness signal dropped")),
            Ok(Err(_)) => Err(StoreError::connection("readiness channel closed")),
            Err(_) => Err(StoreError::Timeout { waited }),
        }
    }

    /// Returns the operation set for one store.
    ///
    /// Operations wait on readiness (per [`WaitOptions`]) if setup has not
    /// completed yet.
    #[must_use]
    pub fn actions<T>(&self, store: &str) -> Actions<T>
    where
        T: Serialize + DeserializeOwned,
    {
        Actions::new(self.clone(), store.to_string(), None)
    }

    /// Returns the operation set for one store, carrying its own config.
    ///
    /// Operations proceed without waiting for setup, opening (and if
    /// needed, creating) the configured database directly.
    #[must_use]
    pub fn actions_with<T>(&self, store: &str, config: SchemaConfig) -> Actions<T>
    where
        T: Serialize + DeserializeOwned,
    {
        Actions::new(self.clone(), store.to_string(), Some(Arc::new(config)))
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ready", &self.is_ready())
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreSchema;
    use std::time::Duration;

    fn todolist_config() -> SchemaConfig {
        SchemaConfig::new("todo-db", 1).store(StoreSchema::new("todolist", "id", true))
    }

    #[tokio::test]
    async fn setup_publishes_readiness() {
        let storage = Storage::new(Engine::in_memory());
        assert!(!storage.is_ready());
        storage.setup(todolist_config()).await.unwrap();
        assert!(storage.is_ready());
    }

    #[tokio::test]
    async fn configless_connection_times_out_before_setup() {
        let storage = Storage::with_options(
            Engine::in_memory(),
            WaitOptions::new().timeout(Duration::from_millis(25)),
        );
        let result = storage.connection(None).await;
        assert!(matches!(result, Err(StoreError::Timeout { .. })));
    }

    #[tokio::test]
    async fn configless_connection_succeeds_after_setup() {
        let storage = Storage::new(Engine::in_memory());
        storage.setup(todolist_config()).await.unwrap();
        let db = storage.connection(None).await.unwrap();
        assert!(db.contains_store("todolist"));
    }

    #[tokio::test]
    async fn explicit_config_bypasses_readiness_wait() {
        let storage = Storage::with_options(
            Engine::in_memory(),
            WaitOptions::new().timeout(Duration::from_millis(25)),
        );
        let config = todolist_config();
        let db = storage.connection(Some(&config)).await.unwrap();
        assert!(db.contains_store("todolist"));
    }

    #[tokio::test]
    async fn waiters_unblock_when_setup_completes() {
        let storage = Storage::new(Engine::in_memory());

        let waiter = {
            let storage = storage.clone();
            tokio::spawn(async move { storage.connection(None).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        storage.setup(todolist_config()).await.unwrap();

        let db = waiter.await.unwrap().unwrap();
        assert!(db.contains_store("todolist"));
    }

    #[tokio::test]
    async fn failed_setup_does_not_publish_readiness() {
        let storage = Storage::with_options(
            Engine::in_memory(),
            WaitOptions::new().timeout(Duration::from_millis(25)),
        );

        // Open at version 2 directly, then bootstrap at the stale version 1;
        // the engine rejects the downgrade and readiness stays unpublished.
        storage
            .connection(Some(&SchemaConfig::new("todo-db", 2)))
            .await
            .unwrap();
        let result = storage.setup(SchemaConfig::new("todo-db", 1)).await;
        assert!(matches!(result, Err(StoreError::Connection { .. })));
        assert!(!storage.is_ready());

        // Config-less operations now time out as specified.
        let result = storage.connection(None).await;
        assert!(matches!(result, Err(StoreError::Timeout { .. })));
    }
}
