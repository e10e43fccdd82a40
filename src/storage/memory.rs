//! In-memory store

use rustc_hash::FxHashMap;

use super::{CartStore, StorageError, is_valid_key};

/// A store that keeps blobs in a map for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: FxHashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Stored keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.blobs.keys().map(String::as_str)
    }
}

impl CartStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn save(&mut self, key: &str, blob: &str) -> Result<(), StorageError> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        self.blobs.insert(key.to_string(), blob.to_string());

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.blobs.remove(key);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn save_load_remove() -> TestResult {
        let mut store = MemoryStore::new();

        store.save("cart", "{}")?;

        assert_eq!(store.load("cart")?, Some("{}".to_string()));
        assert_eq!(store.len(), 1);

        store.remove("cart")?;

        assert_eq!(store.load("cart")?, None);
        assert!(store.is_empty());

        Ok(())
    }

    #[test]
    fn removing_missing_key_is_ok() -> TestResult {
        let mut store = MemoryStore::new();

        store.remove("missing")?;

        Ok(())
    }

    #[test]
    fn invalid_key_is_rejected() {
        let mut store = MemoryStore::new();

        assert!(matches!(
            store.save("a/b", "{}"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
