//! # Cache Lifecycle
//!
//! Install and activation of a worker generation. Install precaches the app
//! shell, activation drops stores left behind by earlier deploys.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheKey, CacheRegistry, CacheResult};
use crate::classify::ContentClass;
use crate::config::EngineConfig;
use crate::fetch::NetworkFetcher;
use crate::request::RequestDescriptor;

/// Where the worker generation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Precaching the shell
    Installing,
    /// Installed, waiting to take over
    Installed,
    /// Reconciled and intercepting requests
    Activated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activated => "activated",
        })
    }
}

pub struct LifecycleManager {
    config: Arc<EngineConfig>,
    registry: CacheRegistry,
}

impl LifecycleManager {
    pub fn new(config: Arc<EngineConfig>, registry: CacheRegistry) -> Self {
        Self { config, registry }
    }

    /// Whether a store survives reconcile although it is not current.
    /// Legacy stores are still searched by the dispatcher, so they stay.
    pub fn is_retained(&self, name: &str) -> bool {
        let legacy = self
            .config
            .legacy_audio_stores
            .iter()
            .chain(&self.config.legacy_image_stores)
            .any(|store| store == name);

        legacy
            || self
                .config
                .retain_patterns
                .iter()
                .any(|pattern| name.contains(pattern.as_str()))
    }

    /// Delete every store that is neither in `current` nor retained.
    /// Returns the names that were deleted.
    pub async fn reconcile(&self, current: &BTreeSet<String>) -> CacheResult<Vec<String>> {
        let mut deleted = Vec::new();

        for name in self.registry.list_names().await? {
            if current.contains(&name) || self.is_retained(&name) {
                debug!(store = %name, "Keeping store");
                continue;
            }

            match self.registry.delete(&name).await {
                Ok(_) => {
                    info!(store = %name, "Deleted outdated store");
                    deleted.push(name);
                }
                Err(e) => warn!(store = %name, error = %e, "Failed to delete outdated store"),
            }
        }

        Ok(deleted)
    }

    /// Fetch the configured shell resources into the shell store. Failures are
    /// logged per resource. Returns the number of resources cached.
    pub async fn precache(&self, fetcher: &NetworkFetcher) -> usize {
        let store_name = self.config.shell_store();
        let store = match self.registry.open(&store_name).await {
            Ok(store) => store,
            Err(e) => {
                warn!(store = %store_name, error = %e, "Shell store unavailable, skipping precache");
                return 0;
            }
        };

        let requests: Vec<RequestDescriptor> = self
            .config
            .precache_urls
            .iter()
            .filter_map(|path| match self.config.resolve_url(path) {
                Ok(url) => Some(RequestDescriptor::get(url)),
                Err(e) => {
                    warn!(path = %path, error = %e, "Invalid precache path");
                    None
                }
            })
            .collect();

        let results = futures::stream::iter(requests)
            .map(|request| async move {
                let response = fetcher.fetch(&request, ContentClass::Shell).await;
                (request, response)
            })
            .buffer_unordered(self.config.warm_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut cached = 0;
        for (request, response) in results {
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %request.url(), error = %e, "Failed to precache resource");
                    continue;
                }
            };

            let entry = CacheEntry::new(CacheKey::from_request(&request), &response);
            match store.put(entry).await {
                Ok(()) => cached += 1,
                Err(e) => warn!(url = %request.url(), error = %e, "Failed to store precached resource"),
            }
        }

        info!(
            cached,
            total = self.config.precache_urls.len(),
            store = %store_name,
            "Shell precache finished"
        );
        cached
    }
}
