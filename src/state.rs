//! Shared key/value state storage.
//!
//! The store itself is a plain concurrent map; change notification and
//! history recording are orchestrated by the bus facade so every mutation
//! flows through the same emit path as ordinary events.

use dashmap::DashMap;
use serde_json::Value;

/// Key/value store backing `set_state` / `get_state`.
pub struct StateStore {
    entries: DashMap<String, Value>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store a value, returning the previous value if the key existed.
    pub fn set(&self, key: &str, value: Value) -> Option<Value> {
        self.entries.insert(key.to_string(), value)
    }

    /// Current value for a key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| v.clone())
    }

    /// Delete a key, returning its value if it existed.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, v)| v)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
