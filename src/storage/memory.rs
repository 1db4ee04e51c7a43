//! In-memory storage scoped to the lifetime of the owning client.

use crate::storage::KeyValueStore;
use crate::LifelineError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Ephemeral key-value store. Dropped with the session that owns it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, LifelineError> {
        self.entries
            .lock()
            .map_err(|_| LifelineError::StorageIO("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, LifelineError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LifelineError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LifelineError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("token").unwrap().is_none());

        store.set("token", "abc").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("abc"));

        store.set("token", "def").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("def"));
        assert_eq!(store.len(), 1);

        store.remove("token").unwrap();
        store.remove("token").unwrap();
        assert!(store.is_empty());
    }
}
