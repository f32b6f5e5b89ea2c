use crate::core::store::KeyValueStore;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// In-memory store, used in tests and when the disk store is unavailable.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let value = map.get(key).cloned();
        if value.is_some() {
            debug!("Store HIT for key: {}", key);
        } else {
            debug!("Store MISS for key: {}", key);
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        debug!("Store PUT for key: {}", key);
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
        debug!("Store REMOVE for key: {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_get_set_remove() {
        let store = MemoryStore::new();

        assert!(store.get("key1").unwrap().is_none());

        store.set("key1", "one").unwrap();
        assert_eq!(store.get("key1").unwrap().as_deref(), Some("one"));

        store.set("key1", "uno").unwrap();
        assert_eq!(store.get("key1").unwrap().as_deref(), Some("uno"));

        store.remove("key1").unwrap();
        assert!(store.get("key1").unwrap().is_none());

        // Removing a missing key is not an error
        store.remove("key2").unwrap();
    }
}
