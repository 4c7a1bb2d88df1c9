//! In-memory key-value store
//!
//! Nothing survives a restart. Useful for tests and one-shot tools.

use dashmap::DashMap;

use super::{KeyValueStore, StorageError};

/// In-memory storage backed by a concurrent map
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("priority", "a").unwrap();
        store.set("priority", "b").unwrap();

        assert_eq!(store.get("priority").unwrap().as_deref(), Some("b"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
