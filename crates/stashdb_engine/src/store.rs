//! Object stores: ordered records with secondary indices.

use crate::error::{EngineError, EngineResult};
use crate::key::{Key, KeyRange};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Parameters fixed at store creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreParams {
    /// Record field holding the primary key.
    pub key_path: String,
    /// Whether the store assigns integer keys from a generator.
    pub auto_increment: bool,
}

/// Parameters for a secondary index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexParams {
    /// Index name, used for lookups.
    pub name: String,
    /// Record field holding the index key.
    pub key_path: String,
    /// Whether two records may share an index key.
    pub unique: bool,
}

/// Extracts a key from the given top-level field of a record.
fn extract_key(value: &Value, key_path: &str) -> Option<Key> {
    value
        .as_object()
        .and_then(|map| map.get(key_path))
        .and_then(Key::from_value)
}

/// One secondary index: index key to the set of primary keys holding it.
///
/// Entries are rebuilt from the records on snapshot load, so only the
/// parameters are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoreIndex {
    params: IndexParams,
    #[serde(skip)]
    entries: BTreeMap<Key, BTreeSet<Key>>,
}

impl StoreIndex {
    fn new(params: IndexParams) -> Self {
        Self {
            params,
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.params.name
    }

    /// Index key of a record, if the record carries one.
    fn extract(&self, value: &Value) -> Option<Key> {
        extract_key(value, &self.params.key_path)
    }

    fn insert(&mut self, index_key: Key, record_key: Key) {
        self.entries.entry(index_key).or_default().insert(record_key);
    }

    fn remove(&mut self, index_key: &Key, record_key: &Key) {
        if let Some(records) = self.entries.get_mut(index_key) {
            records.remove(record_key);
            if records.is_empty() {
                self.entries.remove(index_key);
            }
        }
    }

    /// Whether inserting `record_key` under the record's index key would
    /// violate a uniqueness constraint.
    fn violates_unique(&self, index_key: &Key, record_key: &Key) -> bool {
        if !self.params.unique {
            return false;
        }
        self.entries
            .get(index_key)
            .is_some_and(|records| records.iter().any(|existing| existing != record_key))
    }

    /// Primary keys matching `index_key`, in primary-key order.
    fn matches(&self, index_key: &Key) -> Vec<Key> {
        self.entries
            .get(index_key)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// A named partition of records, ordered by primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ObjectStore {
    name: String,
    params: StoreParams,
    /// Next key the auto-increment generator will hand out.
    next_key: i64,
    records: BTreeMap<Key, Value>,
    indices: Vec<StoreIndex>,
}

impl ObjectStore {
    pub(crate) fn new(name: &str, params: StoreParams) -> Self {
        Self {
            name: name.to_string(),
            params,
            next_key: 1,
            records: BTreeMap::new(),
            indices: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn index(&self, name: &str) -> EngineResult<&StoreIndex> {
        self.indices
            .iter()
            .find(|index| index.name() == name)
            .ok_or_else(|| EngineError::IndexNotFound {
                name: name.to_string(),
            })
    }

    pub(crate) fn contains_index(&self, name: &str) -> bool {
        self.indices.iter().any(|index| index.name() == name)
    }

    /// Creates a secondary index, backfilling it from existing records.
    pub(crate) fn create_index(&mut self, params: IndexParams) -> EngineResult<()> {
        if self.contains_index(&params.name) {
            return Err(EngineError::IndexExists { name: params.name });
        }
        let mut index = StoreIndex::new(params);
        for (record_key, value) in &self.records {
            if let Some(index_key) = index.extract(value) {
                if index.violates_unique(&index_key, record_key) {
                    return Err(EngineError::ConstraintViolation { key: index_key });
                }
                index.insert(index_key, record_key.clone());
            }
        }
        self.indices.push(index);
        Ok(())
    }

    /// Rebuilds all index entries from the records (after snapshot load).
    pub(crate) fn rebuild_indices(&mut self) {
        let records = &self.records;
        for index in &mut self.indices {
            index.entries.clear();
            for (record_key, value) in records {
                if let Some(index_key) = index.extract(value) {
                    index.insert(index_key, record_key.clone());
                }
            }
        }
    }

    pub(crate) fn get(&self, key: &Key) -> Option<Value> {
        self.records.get(key).cloned()
    }

    pub(crate) fn get_all(&self, range: Option<&KeyRange>) -> Vec<Value> {
        match range {
            None => self.records.values().cloned().collect(),
            Some(range) if range.is_degenerate() => Vec::new(),
            Some(range) => self
                .records
                .range::<Key, _>(range.bounds())
                .map(|(_, value)| value.clone())
                .collect(),
        }
    }

    /// Records in key order, optionally restricted to a range.
    pub(crate) fn entries_in(&self, range: Option<&KeyRange>) -> Vec<(Key, Value)> {
        match range {
            None => self
                .records
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Some(range) if range.is_degenerate() => Vec::new(),
            Some(range) => self
                .records
                .range::<Key, _>(range.bounds())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// First record whose index key equals `key`, in primary-key order.
    pub(crate) fn index_get(&self, index: &str, key: &Key) -> EngineResult<Option<Value>> {
        let matches = self.index(index)?.matches(key);
        Ok(matches
            .first()
            .and_then(|record_key| self.records.get(record_key).cloned()))
    }

    /// All records whose index key equals `key`, in primary-key order.
    pub(crate) fn index_get_all(&self, index: &str, key: &Key) -> EngineResult<Vec<Value>> {
        let matches = self.index(index)?.matches(key);
        Ok(matches
            .iter()
            .filter_map(|record_key| self.records.get(record_key).cloned())
            .collect())
    }

    /// Inserts a record, failing if its key already exists.
    pub(crate) fn add(&mut self, value: Value, key: Option<Key>) -> EngineResult<Key> {
        let (key, value) = self.prepare(value, key)?;
        if self.records.contains_key(&key) {
            return Err(EngineError::ConstraintViolation { key });
        }
        self.check_unique(&key, &value)?;
        self.index_insert(&key, &value);
        self.records.insert(key.clone(), value);
        Ok(key)
    }

    /// Inserts or replaces a record.
    pub(crate) fn put(&mut self, value: Value, key: Option<Key>) -> EngineResult<Key> {
        let (key, value) = self.prepare(value, key)?;
        self.check_unique(&key, &value)?;
        if let Some(previous) = self.records.remove(&key) {
            self.index_remove(&key, &previous);
        }
        self.index_insert(&key, &value);
        self.records.insert(key.clone(), value);
        Ok(key)
    }

    /// Removes a record. Absent keys are a no-op.
    pub(crate) fn delete(&mut self, key: &Key) {
        if let Some(previous) = self.records.remove(key) {
            self.index_remove(key, &previous);
        }
    }

    /// Removes every record. The key generator is not reset.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
        for index in &mut self.indices {
            index.entries.clear();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Resolves the key for an incoming record and writes it through to the
    /// record's key path.
    ///
    /// Resolution order: explicit key argument, then the record's in-line
    /// key-path field, then the auto-increment generator, then a generated
    /// unique string. In-line or explicit integer keys at or above the
    /// generator's next value bump the generator past them.
    fn prepare(&mut self, mut value: Value, explicit: Option<Key>) -> EngineResult<(Key, Value)> {
        let inline = extract_key(&value, &self.params.key_path);
        let has_key_field = value
            .as_object()
            .and_then(|map| map.get(&self.params.key_path))
            .is_some_and(|field| !field.is_null());

        if explicit.is_none() && has_key_field && inline.is_none() {
            return Err(EngineError::key_error(format!(
                "field {:?} of a record in store {:?} is not a valid key",
                self.params.key_path, self.name
            )));
        }

        let key = if let Some(key) = explicit {
            key
        } else if let Some(key) = inline {
            key
        } else if self.params.auto_increment {
            let key = Key::Int(self.next_key);
            self.next_key += 1;
            key
        } else {
            Key::Text(Uuid::new_v4().to_string())
        };

        if let Key::Int(n) = key {
            if n >= self.next_key {
                self.next_key = n + 1;
            }
        }

        match value.as_object_mut() {
            Some(map) => {
                map.insert(self.params.key_path.clone(), key.to_value());
            }
            None => {
                return Err(EngineError::key_error(format!(
                    "record in store {:?} is not an object",
                    self.name
                )));
            }
        }
        Ok((key, value))
    }

    /// Validates all unique indices before any mutation.
    fn check_unique(&self, record_key: &Key, value: &Value) -> EngineResult<()> {
        for index in &self.indices {
            if let Some(index_key) = index.extract(value) {
                if index.violates_unique(&index_key, record_key) {
                    return Err(EngineError::ConstraintViolation { key: index_key });
                }
            }
        }
        Ok(())
    }

    fn index_insert(&mut self, record_key: &Key, value: &Value) {
        for index in &mut self.indices {
            if let Some(index_key) = index.extract(value) {
                index.insert(index_key, record_key.clone());
            }
        }
    }

    fn index_remove(&mut self, record_key: &Key, value: &Value) {
        for index in &mut self.indices {
            if let Some(index_key) = index.extract(value) {
                index.remove(&index_key, record_key);
            }
        }
    }
}
