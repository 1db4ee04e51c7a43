//! File-based storage backend with atomic writes.
//!
//! Stores one JSON document per key under `dirs::data_dir()/<namespace>/`.
//! Uses temp file + rename for atomic writes.

use crate::storage::KeyValueStore;
use crate::LifelineError;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Durable file-backed key-value store.
#[derive(Debug)]
pub struct FileStore {
    /// Directory holding one file per key.
    dir: PathBuf,
}

impl FileStore {
    /// Create a file store with the given namespace.
    ///
    /// Files are stored under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, LifelineError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| LifelineError::StorageIO("Could not find data directory".to_string()))?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Create a file store at a specific directory.
    pub fn with_path(dir: PathBuf) -> Result<Self, LifelineError> {
        fs::create_dir_all(&dir)
            .map_err(|e| LifelineError::StorageIO(format!("Failed to create store dir: {}", e)))?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, LifelineError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(LifelineError::StorageIO(format!("Invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, LifelineError> {
        let path = self.key_path(key)?;

        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LifelineError::StorageIO(format!("Failed to read {}: {}", key, e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LifelineError> {
        let target_path = self.key_path(key)?;
        let temp_path = self.dir.join(format!("{}.tmp", key));

        fs::write(&temp_path, value)
            .map_err(|e| LifelineError::StorageIO(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &target_path)
            .map_err(|e| LifelineError::StorageIO(format!("Failed to rename store file: {}", e)))?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LifelineError> {
        let path = self.key_path(key)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LifelineError::StorageIO(format!("Failed to delete {}: {}", key, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        store.set("sim_users", r#"[{"id":"1"}]"#).unwrap();
        assert_eq!(
            store.get("sim_users").unwrap().as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );
    }

    #[test]
    fn test_file_store_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        assert!(store.get("nothing").unwrap().is_none());
        store.remove("nothing").unwrap();
    }

    #[test]
    fn test_file_store_overwrite_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        store.set("sim_contacts", "{}").unwrap();
        store.set("sim_contacts", r#"{"u1":[]}"#).unwrap();

        assert_eq!(store.get("sim_contacts").unwrap().as_deref(), Some(r#"{"u1":[]}"#));
        assert!(!temp_dir.path().join("sim_contacts.tmp").exists());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = FileStore::with_path(temp_dir.path().to_path_buf()).unwrap();
            store.set("sim_users", "[]").unwrap();
        }
        let reopened = FileStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.get("sim_users").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        assert!(matches!(
            store.set("../escape", "x"),
            Err(LifelineError::StorageIO(_))
        ));
        assert!(store.get("").is_err());
    }
}
