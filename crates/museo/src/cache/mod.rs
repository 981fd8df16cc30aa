//! # Cache System
//!
//! Named, persistent stores of cached responses. The registry hands out store
//! handles; backends decide where entries live.

// Module declarations
pub mod providers;
mod registry;
mod types;

// Re-export primary types from our various modules
pub use registry::{CacheRegistry, Store};
pub use types::{
    CacheEntry, CacheKey, CacheLookupResult, CacheMetadata, CacheResult, StorageConfig,
};

pub use providers::{CacheBackend, FileBackend, MemoryBackend};
