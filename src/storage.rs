//! Local Storage Module
//!
//! Key-value blobs on disk, one JSON file per key. This is the offline
//! mirror every repository writes through.

use std::path::{Path, PathBuf};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn, debug};

/// Prefix shared by every key the application writes.
pub const KEY_PREFIX: &str = "capymes_";

/// JSON-file backed key-value store
#[derive(Debug, Clone)]
pub struct LocalStore {
    storage_path: PathBuf,
}

impl LocalStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let storage_path = dir.into();

        std::fs::create_dir_all(&storage_path)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("Local storage initialized at: {:?}", storage_path);

        Ok(Self { storage_path })
    }

    /// Directory the blobs live in
    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{}{}.json", KEY_PREFIX, key))
    }

    /// Serialize and write `data` under `key`, replacing any previous value
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let json = serde_json::to_vec(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        std::fs::write(self.file_for(key), json)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("Saved data for key: {}", key);
        Ok(())
    }

    /// Read and deserialize the value under `key`
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
        let file_path = self.file_for(key);

        let bytes = match std::fs::read(&file_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::Missing(key.to_string()))
            }
            Err(e) => return Err(StorageError::Io(e.to_string())),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Load a list, falling back to `seed` when the key is absent or unreadable.
    pub fn load_list<T, F>(&self, key: &str, seed: F) -> Vec<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Vec<T>,
    {
        match self.load::<Vec<T>>(key) {
            Ok(items) => items,
            Err(StorageError::Missing(_)) => seed(),
            Err(e) => {
                warn!("Failed to load {}, using seed data: {}", key, e);
                seed()
            }
        }
    }

    /// Delete stored data
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let file_path = self.file_for(key);

        if file_path.exists() {
            std::fs::remove_file(&file_path)
                .map_err(|e| StorageError::Io(e.to_string()))?;
            info!("Deleted stored data for key: {}", key);
        }

        Ok(())
    }

    /// Check if key exists
    pub fn exists(&self, key: &str) -> bool {
        self.file_for(key).exists()
    }
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No stored data for key: {0}")]
    Missing(String),
}
