//! # Store Registry
//!
//! Owns the set of named stores on top of a [`CacheBackend`]. Hands out
//! [`Store`] handles that are cheap to create and must not be kept across a
//! delete: every handle remembers the generation of its name, and writes
//! through a handle whose store was deleted in the meantime are refused.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::providers::{CacheBackend, FileBackend, MemoryBackend};
use crate::cache::types::{
    CacheEntry, CacheKey, CacheLookupResult, CacheResult, StorageConfig,
};
use crate::error::CacheError;

struct RegistryInner {
    backend: Arc<dyn CacheBackend>,
    /// Bumped on every delete of a name
    generations: Mutex<HashMap<String, u64>>,
    /// Writes hold the shared side, deletes the exclusive side
    lifecycle: RwLock<()>,
}

impl RegistryInner {
    fn generation(&self, name: &str) -> u64 {
        self.generations.lock().get(name).copied().unwrap_or(0)
    }
}

/// Registry of named, versioned stores
#[derive(Clone)]
pub struct CacheRegistry {
    inner: Arc<RegistryInner>,
}

impl CacheRegistry {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                backend,
                generations: Mutex::new(HashMap::new()),
                lifecycle: RwLock::new(()),
            }),
        }
    }

    /// Registry over a fresh in-memory backend
    pub fn in_memory(max_store_size: u64) -> Self {
        Self::new(Arc::new(MemoryBackend::new(max_store_size)))
    }

    /// Build the registry described by `config`: durable when a path is set
    pub async fn from_config(config: &StorageConfig) -> CacheResult<Self> {
        match &config.disk_cache_path {
            Some(path) => {
                let backend = FileBackend::new(path.clone()).await?;
                info!(dir = ?path, "Using file-backed cache stores");
                Ok(Self::new(Arc::new(backend)))
            }
            None => {
                info!("Using in-memory cache stores");
                Ok(Self::in_memory(config.max_memory_store_size))
            }
        }
    }

    /// Open a store, creating it if absent. Idempotent.
    pub async fn open(&self, name: &str) -> CacheResult<Store> {
        let _guard = self.inner.lifecycle.read().await;
        self.inner.backend.create_store(name).await?;

        Ok(Store {
            name: name.to_string(),
            generation: self.inner.generation(name),
            registry: self.inner.clone(),
        })
    }

    /// Delete a store and all of its entries. Waits for in-flight writes.
    pub async fn delete(&self, name: &str) -> CacheResult<bool> {
        let _guard = self.inner.lifecycle.write().await;
        *self
            .inner
            .generations
            .lock()
            .entry(name.to_string())
            .or_insert(0) += 1;

        let existed = self.inner.backend.delete_store(name).await?;
        if existed {
            debug!(store = name, "Store deleted");
        }
        Ok(existed)
    }

    /// Names of all existing stores, sorted
    pub async fn list_names(&self) -> CacheResult<Vec<String>> {
        self.inner.backend.store_names().await
    }

    /// Whether a store with this name currently exists
    pub async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.list_names().await?.iter().any(|n| n == name))
    }
}

/// Handle to one named store
#[derive(Clone)]
pub struct Store {
    name: String,
    generation: u64,
    registry: Arc<RegistryInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Store {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_current(&self) -> bool {
        self.registry.generation(&self.name) == self.generation
    }

    /// Look up an entry
    pub async fn get(&self, key: &CacheKey) -> CacheLookupResult {
        if !self.is_current() {
            return Ok(None);
        }
        self.registry.backend.get(&self.name, key).await
    }

    /// Write an entry, replacing any entry under the same key
    pub async fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        let _guard = self.registry.lifecycle.read().await;
        if !self.is_current() {
            return Err(CacheError::StaleHandle(self.name.clone()));
        }
        self.registry.backend.put(&self.name, entry).await
    }

    /// Keys of all entries
    pub async fn keys(&self) -> CacheResult<Vec<CacheKey>> {
        if !self.is_current() {
            return Ok(Vec::new());
        }
        self.registry.backend.keys(&self.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use bytes::Bytes;
    use url::Url;

    fn key(path: &str) -> CacheKey {
        CacheKey::get(&Url::parse(&format!("https://guide.example/{path}")).unwrap())
    }

    fn entry(path: &str, body: &'static str) -> CacheEntry {
        CacheEntry::new(key(path), &Response::ok("text/plain", Bytes::from_static(body.as_bytes())))
    }

    #[tokio::test]
    async fn test_open_is_idempotent_and_lazy() {
        let registry = CacheRegistry::in_memory(1024);
        assert!(registry.list_names().await.unwrap().is_empty());

        registry.open("data-cache-v6").await.unwrap();
        registry.open("data-cache-v6").await.unwrap();
        assert_eq!(registry.list_names().await.unwrap(), vec!["data-cache-v6"]);
        assert!(registry.has("data-cache-v6").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_key_written_twice_keeps_latest() {
        let registry = CacheRegistry::in_memory(1024);
        let store = registry.open("s").await.unwrap();
        store.put(entry("a", "v1")).await.unwrap();
        store.put(entry("a", "v2")).await.unwrap();

        assert_eq!(store.keys().await.unwrap().len(), 1);
        let hit = store.get(&key("a")).await.unwrap().unwrap();
        assert_eq!(hit.data, Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn test_stale_handle_cannot_write_into_recreated_store() {
        let registry = CacheRegistry::in_memory(1024);
        let old = registry.open("audio-cache-v6").await.unwrap();
        old.put(entry("a", "old")).await.unwrap();

        assert!(registry.delete("audio-cache-v6").await.unwrap());
        let fresh = registry.open("audio-cache-v6").await.unwrap();

        assert!(matches!(
            old.put(entry("b", "late")).await,
            Err(CacheError::StaleHandle(_))
        ));
        assert!(old.get(&key("a")).await.unwrap().is_none());
        assert!(fresh.get(&key("a")).await.unwrap().is_none());
        assert!(fresh.get(&key("b")).await.unwrap().is_none());

        fresh.put(entry("c", "new")).await.unwrap();
        assert!(fresh.get(&key("c")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_store() {
        let registry = CacheRegistry::in_memory(1024);
        assert!(!registry.delete("nothing").await.unwrap());
    }

    #[tokio::test]
    async fn test_from_config_uses_disk_when_path_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            disk_cache_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let registry = CacheRegistry::from_config(&config).await.unwrap();
        registry.open("shell-cache-v6").await.unwrap();
        assert!(dir.path().join("shell-cache-v6").is_dir());
    }
}
