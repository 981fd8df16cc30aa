//! # File Backend
//!
//! This module implements a durable, file-based store backend. Each store is a
//! directory under the cache root; each entry is a `<hash>.body` file holding
//! the response bytes and a `<hash>.meta` JSON file holding status, headers and
//! the original key.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::fs;
use tokio::io;
use tracing::{debug, warn};

use crate::cache::types::{CacheEntry, CacheKey, CacheLookupResult, CacheMetadata, CacheResult};
use crate::error::CacheError;

use super::CacheBackend;

const BODY_EXTENSION: &str = "body";
const META_EXTENSION: &str = "meta";

#[derive(Debug)]
pub struct FileBackend {
    cache_dir: PathBuf,
    /// Disambiguates temp files of concurrent writers to the same key
    write_seq: AtomicU64,
}

impl FileBackend {
    /// Create a file backend rooted at `cache_dir`, creating the directory
    pub async fn new(cache_dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CacheError::unavailable(cache_dir.display().to_string(), e))?;

        debug!(dir = ?cache_dir, "File backend ready");

        Ok(Self {
            cache_dir,
            write_seq: AtomicU64::new(0),
        })
    }

    /// Directory of a store. Store names double as directory names, so
    /// anything that could escape the cache root is rejected.
    fn store_dir(&self, store: &str) -> CacheResult<PathBuf> {
        let valid = !store.is_empty()
            && store != "."
            && store != ".."
            && store
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if !valid {
            return Err(CacheError::unavailable(
                store,
                io::Error::new(io::ErrorKind::InvalidInput, "invalid store name"),
            ));
        }
        Ok(self.cache_dir.join(store))
    }

    fn entry_paths(&self, store: &str, key: &CacheKey) -> CacheResult<(PathBuf, PathBuf)> {
        let dir = self.store_dir(store)?;
        let name = key.to_filename();
        Ok((
            dir.join(format!("{name}.{BODY_EXTENSION}")),
            dir.join(format!("{name}.{META_EXTENSION}")),
        ))
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        PathBuf::from(name)
    }

    async fn read_metadata(path: &Path) -> Option<CacheMetadata> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read cache metadata file");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to parse cache metadata");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl CacheBackend for FileBackend {
    async fn create_store(&self, store: &str) -> CacheResult<()> {
        let dir = self.store_dir(store)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::unavailable(store, e))
    }

    async fn delete_store(&self, store: &str) -> CacheResult<bool> {
        let dir = self.store_dir(store)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(store, "File store deleted");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                warn!(dir = ?dir, error = %e, "Failed to remove store directory");
                Err(CacheError::unavailable(store, e))
            }
        }
    }

    async fn store_names(&self) -> CacheResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| CacheError::unavailable(self.cache_dir.display().to_string(), e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn get(&self, store: &str, key: &CacheKey) -> CacheLookupResult {
        let (data_path, meta_path) = self.entry_paths(store, key)?;

        let Some(metadata) = Self::read_metadata(&meta_path).await else {
            return Ok(None);
        };

        let data = match fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = ?data_path, error = %e, "Failed to read cache data file");
                return Err(CacheError::unavailable(store, e));
            }
        };

        // Body and metadata of two racing writers may have been paired up
        if metadata.size != data.len() as u64 || metadata.key != *key {
            debug!(store, key = ?key, "Inconsistent cache entry, treating as miss");
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            data: Bytes::from(data),
            metadata,
        }))
    }

    async fn put(&self, store: &str, entry: CacheEntry) -> CacheResult<()> {
        let (data_path, meta_path) = self.entry_paths(store, entry.key())?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::unavailable(store, e))?;
        }

        let metadata_json = serde_json::to_vec(&entry.metadata).map_err(|e| {
            CacheError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize metadata: {e}"),
            ))
        })?;

        // Write to temporary files first, then rename into place
        let temp_data_path = self.temp_path(&data_path);
        let temp_meta_path = self.temp_path(&meta_path);

        if let Err(e) = fs::write(&temp_data_path, &entry.data).await {
            warn!(path = ?temp_data_path, error = %e, "Failed to write cache data file");
            return Err(CacheError::unavailable(store, e));
        }

        if let Err(e) = fs::write(&temp_meta_path, &metadata_json).await {
            warn!(path = ?temp_meta_path, error = %e, "Failed to write cache metadata file");
            let _ = fs::remove_file(&temp_data_path).await;
            return Err(CacheError::unavailable(store, e));
        }

        if let Err(e) = fs::rename(&temp_data_path, &data_path).await {
            warn!(
                from = ?temp_data_path,
                to = ?data_path,
                error = %e,
                "Failed to rename temporary data file"
            );
            let _ = fs::remove_file(&temp_data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(CacheError::unavailable(store, e));
        }

        if let Err(e) = fs::rename(&temp_meta_path, &meta_path).await {
            warn!(
                from = ?temp_meta_path,
                to = ?meta_path,
                error = %e,
                "Failed to rename temporary metadata file"
            );
            // Data without metadata is never served, drop it
            let _ = fs::remove_file(&data_path).await;
            let _ = fs::remove_file(&temp_meta_path).await;
            return Err(CacheError::unavailable(store, e));
        }

        debug!(store, key = ?entry.key(), "Cached entry to file");
        Ok(())
    }

    async fn keys(&self, store: &str) -> CacheResult<Vec<CacheKey>> {
        let dir = self.store_dir(store)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::unavailable(store, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXTENSION) {
                continue;
            }
            if let Some(metadata) = Self::read_metadata(&path).await {
                keys.push(metadata.key);
            }
        }
        Ok(keys)
    }
}
