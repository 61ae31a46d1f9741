//! CLI storage.
//!
//! Settings and history live in one JSON object at `~/.evectl/store.json`,
//! one string value per key.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use evectl_core::error::StorageError;
use evectl_core::host::KeyValueStore;
use tokio::sync::Mutex;
use tracing::debug;

/// Path to the config directory: `~/.evectl/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".evectl"))
}

/// Path to the default store file: `~/.evectl/store.json`.
pub fn store_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("store.json"))
}

/// [`KeyValueStore`] backed by a single JSON file.
///
/// Every write rewrites the whole file, so a crash never leaves half a key
/// behind. A missing file reads as an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at the default location.
    pub fn open_default() -> anyhow::Result<Self> {
        let path = store_path().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self, key: &str) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| StorageError::new(key, format!("corrupt store file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::new(key, e.to_string())),
        }
    }

    async fn write_all(
        &self,
        key: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        let io_err = |e: std::io::Error| StorageError::new(key, e.to_string());
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| StorageError::new(key, e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        debug!(path = %self.path.display(), key, "Store written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all(key).await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all(key).await?;
        values.insert(key.to_string(), value);
        self.write_all(key, &values).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all(key).await?;
        if values.remove(key).is_some() {
            self.write_all(key, &values).await?;
        }
        Ok(())
    }
}
