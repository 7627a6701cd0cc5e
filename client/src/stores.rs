// Backends for the time-boxed cache. The filesystem store keeps entries
// across runs; the memory store lives as long as the process.
use crate::cache::CacheStore;
use crate::config::StoreConfig;
use crate::errors::CacheError;
use async_trait::async_trait;
use moka::sync::Cache;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MEMORY_CAPACITY: u64 = 1000;

pub fn get_store(config: &StoreConfig) -> Arc<dyn CacheStore> {
    match config {
        StoreConfig::Filesystem { base_dir } => Arc::new(FilesystemStore::new(base_dir)),
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    }
}

/// One `<key>.json` file per key under `base_dir`, created on first write.
pub struct FilesystemStore {
    base_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        FilesystemStore {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl CacheStore for FilesystemStore {
    async fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: String) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::write(&path, value).await?;
        tracing::debug!(path = %path.display(), "Stored cache entry");
        Ok(())
    }
}

/// Bounded in-process store
pub struct MemoryStore {
    entries: Cache<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entries: Cache::builder().max_capacity(MEMORY_CAPACITY).build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key))
    }

    async fn write(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}
