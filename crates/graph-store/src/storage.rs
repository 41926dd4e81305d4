//! Client-side persisted state
//!
//! A small key/value abstraction in the spirit of browser local storage.
//! The store caches layouts here, the portal keeps its app-mode toggle here,
//! and the remix basket can be parked here between sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::storage_keys;

/// Error from a local storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

/// Synchronous string key/value storage
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Read and deserialize a JSON value; malformed entries read as absent
    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        load_json(self, key)
    }
}

/// Read a JSON value from any storage, including trait objects
pub fn load_json<T: serde::de::DeserializeOwned>(storage: &(impl LocalStorage + ?Sized), key: &str) -> Option<T> {
    let raw = storage.get_item(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring malformed local storage entry '{}': {}", key, e);
            None
        }
    }
}

/// Serialize and write a JSON value to any storage
pub fn save_json<T: Serialize>(
    storage: &(impl LocalStorage + ?Sized),
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    // Serializing our own types to a string cannot fail
    let raw = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    storage.set_item(key, &raw)
}

/// Process-local storage
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// Storage with one file per key under a directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir`, creating it on first write
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let path = self.path_for(key).ok()?;
        std::fs::read_to_string(path).ok()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, value).map_err(|source| StorageError::Io { path, source })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// Portal-wide UI mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    #[default]
    Normal,
    /// Remix basket and package browser enabled
    Remix,
    /// Node-graph editor enabled
    Developer,
}

impl AppMode {
    /// Read the persisted mode, defaulting to `Normal`
    pub fn load(storage: &dyn LocalStorage) -> Self {
        load_json(storage, storage_keys::APP_MODE).unwrap_or_default()
    }

    pub fn save(self, storage: &dyn LocalStorage) -> Result<(), StorageError> {
        save_json(storage, storage_keys::APP_MODE, &self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.get_item("a").is_none());
        storage.set_item("a", "1").unwrap();
        assert_eq!(storage.get_item("a").as_deref(), Some("1"));
        storage.remove_item("a").unwrap();
        assert!(storage.get_item("a").is_none());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));
        storage.set_item("graph.layouts", "{}").unwrap();
        assert_eq!(storage.get_item("graph.layouts").as_deref(), Some("{}"));
        storage.remove_item("graph.layouts").unwrap();
        storage.remove_item("graph.layouts").unwrap();
        assert!(storage.get_item("graph.layouts").is_none());
    }

    #[test]
    fn test_file_storage_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(matches!(
            storage.set_item("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_app_mode_persistence() {
        let storage = MemoryStorage::new();
        assert_eq!(AppMode::load(&storage), AppMode::Normal);
        AppMode::Developer.save(&storage).unwrap();
        assert_eq!(AppMode::load(&storage), AppMode::Developer);
        assert_eq!(storage.get_item("portal.appMode").as_deref(), Some("\"developer\""));
    }

    #[test]
    fn test_malformed_entry_reads_as_absent() {
        let storage = MemoryStorage::new();
        storage.set_item("portal.appMode", "\"turbo\"").unwrap();
        assert_eq!(AppMode::load(&storage), AppMode::Normal);
    }
}
