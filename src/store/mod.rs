pub mod context;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{MiddlewareError, Result};

pub use context::{STORAGE_PREFIX, read_context, update_context};

/// Key-value storage supplied by the bot framework.
///
/// `read` returns only the keys that exist; missing keys are simply absent
/// from the map.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, Value>>;
    async fn write(&self, changes: HashMap<String, Value>) -> Result<()>;
}

/// In-process storage. Contents are lost when the process exits.
pub struct MemoryStorage {
    items: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub async fn count(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.items.read().await.get(key).cloned()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| items.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn write(&self, changes: HashMap<String, Value>) -> Result<()> {
        let mut items = self.items.write().await;
        items.extend(changes);
        Ok(())
    }
}

/// Storage backed by a single JSON object file.
///
/// Every write rewrites the whole file through a sibling temp file that is
/// renamed into place; a missing file reads as empty. `lock` serializes
/// load-modify-write so concurrent writers for different keys keep each
/// other's records.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> MiddlewareError {
        MiddlewareError::StorageIo {
            path: self.path.clone(),
            source,
        }
    }

    async fn load(&self) -> Result<serde_json::Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(serde_json::Map::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        serde_json::from_str(&content).map_err(|source| MiddlewareError::StorageFormat {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let _guard = self.lock.lock().await;
        let items = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|k| items.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn write(&self, changes: HashMap<String, Value>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        let count = changes.len();
        items.extend(changes);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let body = serde_json::to_string_pretty(&items).map_err(|source| {
            MiddlewareError::StorageFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, body)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), keys = count, "store written");
        Ok(())
    }
}
