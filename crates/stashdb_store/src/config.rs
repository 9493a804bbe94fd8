//! Schema configuration.

use serde::{Deserialize, Serialize};
use stashdb_engine::{IndexParams, StoreParams};
use std::time::Duration;

/// Declares the database a [`Storage`] manages: its name, schema version,
/// and the stores (with indices) to create on first use or on a version
/// increase.
///
/// The config is immutable once passed to [`Storage::setup`]. Serialized
/// form uses camelCase field names, so configs can be loaded from the same
/// JSON shape applications commonly keep them in:
///
/// ```rust
/// use stashdb_store::SchemaConfig;
///
/// let config = SchemaConfig::from_json(r#"{
///     "databaseName": "todo-db",
///     "version": 1,
///     "stores": [
///         {"name": "todolist", "id": {"keyPath": "id", "autoIncrement": true}}
///     ]
/// }"#).unwrap();
/// assert_eq!(config.stores.len(), 1);
/// ```
///
/// [`Storage`]: crate::Storage
/// [`Storage::setup`]: crate::Storage::setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaConfig {
    /// Database name.
    pub database_name: String,
    /// Schema version; raising it re-runs schema application.
    pub version: u32,
    /// Stores to ensure exist.
    pub stores: Vec<StoreSchema>,
}

impl SchemaConfig {
    /// Creates a config with no stores declared.
    #[must_use]
    pub fn new(database_name: impl Into<String>, version: u32) -> Self {
        Self {
            database_name: database_name.into(),
            version,
            stores: Vec::new(),
        }
    }

    /// Adds a store declaration.
    #[must_use]
    pub fn store(mut self, store: StoreSchema) -> Self {
        self.stores.push(store);
        self
    }

    /// Parses a config from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns the underlying parse error if the JSON does not match the
    /// config shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One store declaration: name, primary key, and indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSchema {
    /// Store name.
    pub name: String,
    /// Primary-key declaration.
    pub id: KeySpec,
    /// Secondary indices to ensure exist.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<IndexSchema>,
}

impl StoreSchema {
    /// Creates a store declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, key_path: impl Into<String>, auto_increment: bool) -> Self {
        Self {
            name: name.into(),
            id: KeySpec {
                key_path: key_path.into(),
                auto_increment,
            },
            indices: Vec::new(),
        }
    }

    /// Adds an index declaration.
    #[must_use]
    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indices.push(index);
        self
    }

    pub(crate) fn params(&self) -> StoreParams {
        StoreParams {
            key_path: self.id.key_path.clone(),
            auto_increment: self.id.auto_increment,
        }
    }
}

/// Primary-key declaration for a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySpec {
    /// Record field holding the primary key.
    pub key_path: String,
    /// Whether the store assigns integer keys from a generator.
    #[serde(default)]
    pub auto_increment: bool,
}

/// Secondary-index declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    /// Index name, used for lookups.
    pub name: String,
    /// Record field holding the index key.
    pub key_path: String,
    /// Index options.
    #[serde(default)]
    pub options: IndexOptions,
}

impl IndexSchema {
    /// Creates a non-unique index declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            options: IndexOptions::default(),
        }
    }

    /// Sets the uniqueness option.
    #[must_use]
    pub fn unique(mut self, unique: bool) -> Self {
        self.options.unique = unique;
        self
    }

    pub(crate) fn params(&self) -> IndexParams {
        IndexParams {
            name: self.name.clone(),
            key_path: self.key_path.clone(),
            unique: self.options.unique,
        }
    }
}

/// Options for a secondary index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Whether two records may share an index key.
    #[serde(default)]
    pub unique: bool,
}

/// Options for the readiness wait performed by config-less connections.
#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    /// How long to wait for setup to publish readiness.
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl WaitOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the readiness-wait timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_declares_stores_and_indices() {
        let config = SchemaConfig::new("todo-db", 1).store(
            StoreSchema::new("todolist", "id", true)
                .index(IndexSchema::new("by_owner", "owner"))
                .index(IndexSchema::new("by_email", "email").unique(true)),
        );

        assert_eq!(config.database_name, "todo-db");
        assert_eq!(config.stores.len(), 1);
        let store = &config.stores[0];
        assert!(store.id.auto_increment);
        assert_eq!(store.indices.len(), 2);
        assert!(!store.indices[0].options.unique);
        assert!(store.indices[1].options.unique);
    }

    #[test]
    fn json_roundtrip_uses_camel_case() {
        let config = SchemaConfig::new("T", 1).store(StoreSchema::new("todolist", "id", true));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("databaseName"));
        assert!(json.contains("keyPath"));
        assert!(json.contains("autoIncrement"));

        let parsed = SchemaConfig::from_json(&json).unwrap();
        assert_eq!(parsed.database_name, "T");
        assert!(parsed.stores[0].id.auto_increment);
    }

    #[test]
    fn optional_fields_default() {
        let config = SchemaConfig::from_json(
            r#"{
                "databaseName": "T",
                "version": 1,
                "stores": [
                    {"name": "todolist", "id": {"keyPath": "id"}}
                ]
            }"#,
        )
        .unwrap();
        let store = &config.stores[0];
        assert!(!store.id.auto_increment);
        assert!(store.indices.is_empty());
    }

    #[test]
    fn default_wait_is_ten_seconds() {
        assert_eq!(WaitOptions::default().timeout, Duration::from_secs(10));
        let custom = WaitOptions::new().timeout(Duration::from_millis(50));
        assert_eq!(custom.timeout, Duration::from_millis(50));
    }
}
