use std::{collections::HashMap, fmt};

use parking_lot::RwLock;

/// Opaque string-keyed storage underneath [`super::LogStore`].
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    /// Store `value` under `key` unless the key is taken. Returns whether
    /// the value was written.
    fn insert_if_absent(&self, key: String, value: String) -> bool;

    fn get(&self, key: &str) -> Option<String>;

    /// Every entry as of one instant.
    fn snapshot(&self) -> Vec<(String, String)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write unconditionally. Used to seed foreign or damaged entries.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn insert_if_absent(&self, key: String, value: String) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, value);
        true
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn snapshot(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
