//! Key-value persistence for priority and quota snapshots.
//!
//! Values are opaque serialized strings. Backends give last-write-wins
//! semantics and nothing more:
//! - **Memory**: process-local, used by tests and short-lived tools.
//! - **JSON files**: one file per key inside a directory, used by the CLI.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Persistence collaborator for configuration and quota snapshots.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Read and deserialize a JSON value.
///
/// A value that fails to parse is reported as `Ok(None)` with a warning so
/// callers fall back to their defaults instead of failing the whole cycle.
pub fn load_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed stored value");
            Ok(None)
        }
    }
}

/// Read and deserialize a JSON value, failing on a value that does not parse.
///
/// For state that must never silently fall back to a default.
pub fn load_json_strict<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StorageError::Serialization(format!("{key}: {e}")))
}

/// Serialize a value as JSON and store it under `key`.
pub fn save_json<T: serde::Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw =
        serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Sample {
        count: u32,
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        assert_eq!(load_json::<Sample>(&store, "sample").unwrap(), None);

        save_json(&store, "sample", &Sample { count: 3 }).unwrap();
        assert_eq!(
            load_json::<Sample>(&store, "sample").unwrap(),
            Some(Sample { count: 3 })
        );
    }

    #[test]
    fn test_malformed_value_is_ignored() {
        let store = MemoryStore::new();
        store.set("sample", "{not json").unwrap();
        assert_eq!(load_json::<Sample>(&store, "sample").unwrap(), None);
    }

    #[test]
    fn test_strict_load_rejects_malformed_value() {
        let store = MemoryStore::new();
        assert_eq!(load_json_strict::<Sample>(&store, "sample").unwrap(), None);

        store.set("sample", "{not json").unwrap();
        assert!(matches!(
            load_json_strict::<Sample>(&store, "sample"),
            Err(StorageError::Serialization(_))
        ));
    }
}
