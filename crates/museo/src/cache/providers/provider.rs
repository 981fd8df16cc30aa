//! # Cache Backend
//!
//! This module defines the backend trait that every store implementation must follow.
//! A backend holds any number of named stores, each a map from [`CacheKey`] to
//! [`CacheEntry`].

use async_trait::async_trait;

use crate::cache::types::{CacheEntry, CacheKey, CacheLookupResult, CacheResult};

/// A trait for backends that persist named stores of cached responses
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Create the store if it does not exist yet
    async fn create_store(&self, store: &str) -> CacheResult<()>;

    /// Delete a store and every entry in it. Returns whether it existed.
    async fn delete_store(&self, store: &str) -> CacheResult<bool>;

    /// Names of all existing stores, sorted
    async fn store_names(&self) -> CacheResult<Vec<String>>;

    /// Get an entry from a store
    async fn get(&self, store: &str, key: &CacheKey) -> CacheLookupResult;

    /// Put an entry into a store, replacing any entry under the same key
    async fn put(&self, store: &str, entry: CacheEntry) -> CacheResult<()>;

    /// Keys of every entry in a store
    async fn keys(&self, store: &str) -> CacheResult<Vec<CacheKey>>;
}
