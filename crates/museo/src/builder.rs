//! # Builder for EngineConfig
//!
//! Fluent construction of an [`EngineConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use museo_engine::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .with_app_name("accademia")
//!     .with_cache_version(7)
//!     .with_timeout(Duration::from_secs(60))
//!     .with_header("X-Guide-Client", "kiosk")
//!     .with_warm_concurrency(8)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.audio_store(), "audio-cache-v7");
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::classify::RoutingRules;
use crate::config::{EngineConfig, FetcherConfig};
use crate::error::EngineError;

/// Builder for creating EngineConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the application name used in language-scoped store names.
    /// Default retention patterns follow the new name.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        if self.config.retain_patterns == EngineConfig::default_retain_patterns(&self.config.app_name)
        {
            self.config.retain_patterns = EngineConfig::default_retain_patterns(&app_name);
        }
        self.config.app_name = app_name;
        self
    }

    pub fn with_app_origin(mut self, origin: Url) -> Self {
        self.config.app_origin = origin;
        self
    }

    /// Use `origin` as the asset host: it becomes the only allowed external
    /// host and the base of the alternate thumbnail URLs.
    pub fn with_asset_origin(mut self, origin: &Url) -> Self {
        if let Some(host) = origin.host_str() {
            self.config.allowed_external_hosts = vec![host.to_string()];
            let base = origin.origin().ascii_serialization();
            self.config.thumbnail_templates = vec![
                format!("{base}/assets/thumbnail/{{lang}}/ID-{{id}}-thumbnail.jpg"),
                format!("{base}/assets/thumb/{{lang}}/ID-{{id}}-thumbnail.jpg"),
            ];
        }
        self
    }

    /// Allow one more external host
    pub fn with_allowed_host(mut self, host: impl Into<String>) -> Self {
        self.config.allowed_external_hosts.push(host.into());
        self
    }

    pub fn with_cache_version(mut self, version: u32) -> Self {
        self.config.cache_version = version;
        self
    }

    pub fn with_legacy_audio_stores(mut self, names: Vec<String>) -> Self {
        self.config.legacy_audio_stores = names;
        self
    }

    pub fn with_legacy_image_stores(mut self, names: Vec<String>) -> Self {
        self.config.legacy_image_stores = names;
        self
    }

    /// Keep stores whose name contains `pattern` across reconciles
    pub fn with_retain_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.retain_patterns.push(pattern.into());
        self
    }

    pub fn with_precache_urls(mut self, urls: Vec<String>) -> Self {
        self.config.precache_urls = urls;
        self
    }

    pub fn with_root_documents(mut self, paths: Vec<String>) -> Self {
        self.config.root_documents = paths;
        self
    }

    pub fn with_no_store_markers(mut self, markers: Vec<String>) -> Self {
        self.config.no_store_markers = markers;
        self
    }

    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.config.skip_waiting = skip_waiting;
        self
    }

    pub fn with_warm_concurrency(mut self, concurrency: usize) -> Self {
        self.config.warm_concurrency = concurrency;
        self
    }

    pub fn with_routing(mut self, routing: RoutingRules) -> Self {
        self.config.routing = routing;
        self
    }

    /// Keep stores on disk under `path` instead of in memory
    pub fn with_disk_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.disk_cache_path = Some(path.into());
        self
    }

    pub fn with_max_memory_store_size(mut self, size: u64) -> Self {
        self.config.storage.max_memory_store_size = size;
        self
    }

    pub fn with_fetcher_config(mut self, fetcher: FetcherConfig) -> Self {
        self.config.fetcher = fetcher;
        self
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher.connect_timeout = timeout;
        self
    }

    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher.pool_idle_timeout = timeout;
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.fetcher.follow_redirects = follow;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.fetcher.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.fetcher.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.fetcher.headers = headers;
        self
    }

    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.config.fetcher.use_system_proxy = use_system_proxy;
        self
    }

    /// Validate and build the EngineConfig instance
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        let config = self.config;

        if config.app_name.is_empty()
            || !config
                .app_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(EngineError::Config(format!(
                "app name '{}' cannot be used in store names",
                config.app_name
            )));
        }

        if config.warm_concurrency == 0 {
            return Err(EngineError::Config(
                "warm concurrency must be at least 1".to_string(),
            ));
        }

        if config.storage.disk_cache_path.is_none() && config.storage.max_memory_store_size == 0 {
            return Err(EngineError::Config(
                "memory store size must be greater than zero".to_string(),
            ));
        }

        if config.root_documents.is_empty() {
            return Err(EngineError::Config(
                "at least one root document path is required".to_string(),
            ));
        }

        Ok(config)
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfigBuilder::new().build().unwrap();
        assert_eq!(config.app_name, "accademia");
        assert_eq!(config.cache_version, 6);
        assert_eq!(config.fetcher.timeout, Duration::from_secs(30));
        assert!(config.skip_waiting);
        assert!(config.storage.disk_cache_path.is_none());
    }

    #[test]
    fn test_builder_customization() {
        let asset = Url::parse("https://cdn.guide.example").unwrap();
        let config = EngineConfig::builder()
            .with_app_name("uffizi")
            .with_asset_origin(&asset)
            .with_cache_version(9)
            .with_timeout(Duration::from_secs(5))
            .with_pool_idle_timeout(Duration::from_secs(90))
            .with_header("X-Custom-Header", "CustomValue")
            .with_disk_cache("/tmp/museo")
            .build()
            .unwrap();

        assert_eq!(config.data_store(), "data-cache-v9");
        assert_eq!(config.allowed_external_hosts, vec!["cdn.guide.example"]);
        assert!(config.thumbnail_templates[0].starts_with("https://cdn.guide.example/assets/"));
        assert!(config.retain_patterns.contains(&"uffizi-audio-".to_string()));
        assert!(!config.retain_patterns.contains(&"accademia-audio-".to_string()));
        assert_eq!(
            config.fetcher.headers.get("X-Custom-Header").unwrap(),
            "CustomValue"
        );
        assert_eq!(config.fetcher.pool_idle_timeout, Duration::from_secs(90));
        assert_eq!(config.storage.disk_cache_path, Some(PathBuf::from("/tmp/museo")));
    }

    #[test]
    fn test_custom_retention_survives_rename() {
        let config = EngineConfig::builder()
            .with_retain_pattern("audio-cache-v5")
            .with_app_name("uffizi")
            .build()
            .unwrap();
        assert!(config.retain_patterns.contains(&"accademia-audio-".to_string()));
        assert!(config.retain_patterns.contains(&"audio-cache-v5".to_string()));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            EngineConfig::builder().with_app_name("a/b").build(),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::builder().with_warm_concurrency(0).build(),
            Err(EngineError::Config(_))
        ));
    }
}
