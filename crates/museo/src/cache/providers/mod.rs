//! # Cache Backends
//!
//! This module contains the store backend implementations.

// Re-export backends for easier access
pub use self::file::FileBackend;
pub use self::memory::MemoryBackend;
pub use self::provider::CacheBackend;

// Backend interface
pub mod provider;

// Individual backend implementations
pub mod file;
pub mod memory;
