//! # Cache Types
//!
//! This module defines common types used across the caching system.

use std::path::PathBuf;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CacheError;
use crate::request::RequestDescriptor;
use crate::response::{Response, ResponseType, ServedFrom};

/// Normalized key of a cached request: method plus URL.
///
/// Range headers and URL fragments never take part in the key, so a partial
/// request and a full request for the same resource share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(method: impl Into<String>, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// Key for a GET of `url`.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    pub fn from_request(request: &RequestDescriptor) -> Self {
        Self::new(request.method().as_str(), request.url())
    }

    /// Convert to a filename-safe string
    pub fn to_filename(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(":");
        hasher.update(self.url.as_bytes());

        let hash = hasher.finalize();
        format!("{hash:x}")
    }
}

/// Metadata for a cached response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// The key this entry was stored under
    pub key: CacheKey,
    /// When the response was cached (seconds since the epoch)
    pub cached_at: u64,
    /// HTTP status of the stored response
    pub status: u16,
    /// Response headers, in order, lossy for non UTF-8 values
    pub headers: Vec<(String, String)>,
    /// Whether the response came from an untrusted-status origin
    pub opaque: bool,
    /// Size of the body in bytes
    pub size: u64,
}

impl CacheMetadata {
    /// Create new metadata for a response
    pub fn new(key: CacheKey, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            key,
            cached_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            status: response.status.as_u16(),
            headers,
            opaque: response.is_opaque(),
            size: response.body.len() as u64,
        }
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<HeaderName>(),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Bytes,
    pub metadata: CacheMetadata,
}

impl CacheEntry {
    pub fn new(key: CacheKey, response: &Response) -> Self {
        Self {
            data: response.body.clone(),
            metadata: CacheMetadata::new(key, response),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.metadata.key
    }

    /// Rebuild the response, tagged with the store it was read from.
    pub fn to_response(&self, store: &str) -> Response {
        let status = StatusCode::from_u16(self.metadata.status).unwrap_or(StatusCode::OK);
        let response_type = if self.metadata.opaque {
            ResponseType::Opaque
        } else {
            ResponseType::Basic
        };

        Response::new(status, self.metadata.header_map(), self.data.clone())
            .with_response_type(response_type)
            .with_served_from(ServedFrom::Cache(store.to_string()))
    }
}

/// Where stores are kept
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory for durable stores; `None` keeps everything in memory,
    /// which is lost when the process exits
    pub disk_cache_path: Option<PathBuf>,
    /// Per-store byte budget of the in-memory backend. Entries are never
    /// evicted; writes past the budget fail.
    pub max_memory_store_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            disk_cache_path: None,
            max_memory_store_size: 256 * 1024 * 1024, // 256MB
        }
    }
}

/// Result of a cache operation
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// A type representing the result of a cache lookup operation
pub type CacheLookupResult = CacheResult<Option<CacheEntry>>;
