//! # Memory Backend
//!
//! This module provides an in-memory store backend using Moka caches, one per store.
//! Nothing survives a restart; hosts that need durability use the file backend.
//! Entries are never evicted: a write that would push a store past its byte
//! budget is refused instead.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use moka::future::Cache as MokaCache;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::providers::CacheBackend;
use crate::cache::types::{CacheEntry, CacheKey, CacheLookupResult, CacheResult};
use crate::error::CacheError;

/// One named store: its entries and the bytes they occupy
#[derive(Clone)]
struct Store {
    entries: MokaCache<CacheKey, CacheEntry>,
    /// Serializes writers so the byte count stays exact
    used: Arc<Mutex<u64>>,
}

impl Store {
    fn new() -> Self {
        Self {
            entries: MokaCache::builder().build(),
            used: Arc::new(Mutex::new(0)),
        }
    }
}

/// Memory backend implementation using Moka
pub struct MemoryBackend {
    stores: RwLock<HashMap<String, Store>>,
    /// Maximum size for each store in bytes
    max_store_size: u64,
}

impl MemoryBackend {
    /// Create a new memory backend with the specified per-store size limit
    pub fn new(max_store_size: u64) -> Self {
        if max_store_size == 0 {
            panic!("Memory store size must be greater than zero");
        }

        debug!(max_store_size, "Memory backend created");

        Self {
            stores: RwLock::new(HashMap::new()),
            max_store_size,
        }
    }

    fn store(&self, name: &str) -> Option<Store> {
        self.stores.read().get(name).cloned()
    }

    fn store_or_create(&self, name: &str) -> Store {
        if let Some(store) = self.store(name) {
            return store;
        }
        self.stores
            .write()
            .entry(name.to_string())
            .or_insert_with(Store::new)
            .clone()
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryBackend {
    async fn create_store(&self, store: &str) -> CacheResult<()> {
        self.store_or_create(store);
        Ok(())
    }

    async fn delete_store(&self, store: &str) -> CacheResult<bool> {
        let removed = self.stores.write().remove(store);
        match removed {
            Some(cache) => {
                cache.entries.invalidate_all();
                debug!(store, "Memory store deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn store_names(&self) -> CacheResult<Vec<String>> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get(&self, store: &str, key: &CacheKey) -> CacheLookupResult {
        let Some(cache) = self.store(store) else {
            return Ok(None);
        };
        Ok(cache.entries.get(key).await)
    }

    async fn put(&self, store: &str, entry: CacheEntry) -> CacheResult<()> {
        let cache = self.store_or_create(store);
        let mut used = cache.used.lock().await;

        let size = entry.metadata.size;
        let replaced = match cache.entries.get(entry.key()).await {
            Some(previous) => previous.metadata.size,
            None => 0,
        };
        let needed = *used - replaced + size;

        if needed > self.max_store_size {
            warn!(
                store,
                key = ?entry.key(),
                size,
                used = *used,
                max_size = self.max_store_size,
                "Memory store full, refusing write"
            );
            return Err(CacheError::unavailable(
                store,
                io::Error::new(io::ErrorKind::StorageFull, "memory store budget exceeded"),
            ));
        }

        cache.entries.insert(entry.key().clone(), entry).await;
        *used = needed;
        Ok(())
    }

    async fn keys(&self, store: &str) -> CacheResult<Vec<CacheKey>> {
        let Some(cache) = self.store(store) else {
            return Ok(Vec::new());
        };
        Ok(cache.entries.iter().map(|(k, _)| (*k).clone()).collect())
    }
}
