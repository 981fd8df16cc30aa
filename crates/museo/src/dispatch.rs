//! # Strategy Dispatcher
//!
//! One strategy per content class:
//!
//! | Class | Lookup order | Strategy |
//! |-------|--------------|----------|
//! | Audio | language store, general store, legacy stores | cache first |
//! | Image | language store, alternate thumbnail keys, general store | cache first |
//! | Data  | data store | stale-while-revalidate |
//! | Shell | shell store | network first |
//!
//! Every path ends in a response. Storage failures only skip the store
//! involved, network failures end in a synthesized fallback.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheEntry, CacheKey, CacheRegistry};
use crate::classify::{Classification, ContentClass};
use crate::config::EngineConfig;
use crate::error::{CacheError, FetchError};
use crate::fetch::{AudioFailure, NetworkFetcher, fallback, repair};
use crate::request::RequestDescriptor;
use crate::response::Response;

#[derive(Clone)]
pub(crate) struct Dispatcher {
    config: Arc<EngineConfig>,
    registry: CacheRegistry,
    fetcher: Arc<NetworkFetcher>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        config: Arc<EngineConfig>,
        registry: CacheRegistry,
        fetcher: Arc<NetworkFetcher>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            tracker,
        }
    }

    /// Serve a classified request with the strategy of its class
    pub async fn dispatch(&self, request: &RequestDescriptor, class: &Classification) -> Response {
        match class.class {
            ContentClass::Audio => self.serve_audio(request, class).await,
            ContentClass::Image => self.serve_image(request, class).await,
            ContentClass::Data => self.serve_data(request).await,
            ContentClass::Shell => self.serve_shell(request).await,
        }
    }

    /// Stores an audio or image response is written to and looked up in first
    pub fn write_targets(&self, class: &Classification) -> Vec<String> {
        let mut targets = Vec::with_capacity(2);
        if let Some(store) = self.config.language_store(class.class, &class.language) {
            targets.push(store);
        }
        targets.push(self.config.class_store(class.class));
        targets
    }

    async fn serve_audio(&self, request: &RequestDescriptor, class: &Classification) -> Response {
        let key = CacheKey::from_request(request);

        let mut candidates = self.write_targets(class);
        candidates.extend(self.config.legacy_audio_stores.iter().cloned());

        if let Some(response) = self.lookup(&candidates, &key).await {
            if repair::needs_repair(&response) {
                return repair::repair_audio(response, request.url());
            }
            return response;
        }

        match self.fetcher.fetch(request, ContentClass::Audio).await {
            Ok(response) => {
                self.write_through(&self.write_targets(class), &key, &response)
                    .await;
                response
            }
            Err(e) => {
                let failure = if e.upstream_status()
                    == Some(reqwest::StatusCode::SERVICE_UNAVAILABLE)
                {
                    AudioFailure::ServiceUnavailable
                } else {
                    AudioFailure::Offline
                };
                log_fetch_failure(request.url(), &e);
                fallback::audio_unavailable(&class.language, failure)
            }
        }
    }

    async fn serve_image(&self, request: &RequestDescriptor, class: &Classification) -> Response {
        let key = CacheKey::from_request(request);
        let general = self.config.image_store();
        let language = self.config.language_store(ContentClass::Image, &class.language);

        if let Some(store) = &language {
            if let Some(response) = self.lookup(std::slice::from_ref(store), &key).await {
                return response;
            }
        }

        if let Some(response) = self.probe_alternates(request.url(), class).await {
            return response;
        }

        if let Some(response) = self.lookup(std::slice::from_ref(&general), &key).await {
            return response;
        }

        match self.fetcher.fetch(request, ContentClass::Image).await {
            Ok(response) => {
                self.write_through(&self.write_targets(class), &key, &response)
                    .await;
                response
            }
            Err(e) => {
                log_fetch_failure(request.url(), &e);
                fallback::image_placeholder(class.entity_id, class.is_thumbnail)
            }
        }
    }

    /// Thumbnails have been published under two URL shapes. Look for the
    /// other shape before giving up on the caches.
    async fn probe_alternates(&self, url: &Url, class: &Classification) -> Option<Response> {
        if !class.can_probe_alternates() {
            return None;
        }
        let entity_id = class.entity_id?;

        let mut stores = Vec::new();
        if let Some(store) = self.config.language_store(ContentClass::Image, &class.language) {
            stores.push(store);
        }
        stores.push(self.config.image_store());
        stores.extend(self.config.legacy_image_stores.iter().cloned());

        for alternate in self.config.thumbnail_alternates(&class.language, entity_id) {
            if alternate == *url {
                continue;
            }
            let key = CacheKey::get(&alternate);
            if let Some(response) = self.lookup(&stores, &key).await {
                debug!(url = %url, alternate = %alternate, "Served thumbnail from alternate URL");
                return Some(response);
            }
        }
        None
    }

    async fn serve_data(&self, request: &RequestDescriptor) -> Response {
        let key = CacheKey::from_request(request);
        let store = self.config.data_store();

        if let Some(response) = self.lookup(std::slice::from_ref(&store), &key).await {
            let this = self.clone();
            let request = request.clone();
            self.tracker.spawn(async move {
                this.revalidate(request, store, key).await;
            });
            return response;
        }

        match self.fetcher.fetch(request, ContentClass::Data).await {
            Ok(response) => {
                self.write_through(std::slice::from_ref(&store), &key, &response)
                    .await;
                response
            }
            Err(e) => {
                log_fetch_failure(request.url(), &e);
                fallback::data_unavailable()
            }
        }
    }

    /// Background half of stale-while-revalidate. Only a 2xx replaces the
    /// cached entry.
    async fn revalidate(&self, request: RequestDescriptor, store: String, key: CacheKey) {
        match self.fetcher.fetch(&request, ContentClass::Data).await {
            Ok(response) if response.status.is_success() => {
                self.write_through(std::slice::from_ref(&store), &key, &response)
                    .await;
                debug!(url = %request.url(), "Data entry revalidated");
            }
            Ok(response) => {
                debug!(url = %request.url(), status = response.status.as_u16(), "Revalidation kept cached entry");
            }
            Err(FetchError::Offline) => {
                debug!(url = %request.url(), "Offline, revalidation skipped");
            }
            Err(e) => {
                warn!(url = %request.url(), error = %e, "Revalidation failed, keeping cached entry");
            }
        }
    }

    async fn serve_shell(&self, request: &RequestDescriptor) -> Response {
        let key = CacheKey::from_request(request);
        let store = self.config.shell_store();

        match self.fetcher.fetch(request, ContentClass::Shell).await {
            Ok(response) => {
                if self.config.is_storable_shell(request.url()) {
                    self.write_through(std::slice::from_ref(&store), &key, &response)
                        .await;
                }
                return response;
            }
            Err(e) => log_fetch_failure(request.url(), &e),
        }

        if let Some(response) = self.lookup(std::slice::from_ref(&store), &key).await {
            return response;
        }

        if !request.is_navigation() {
            return fallback::shell_unavailable();
        }

        for path in &self.config.root_documents {
            let Ok(url) = self.config.resolve_url(path) else {
                continue;
            };
            if let Some(response) = self
                .lookup(std::slice::from_ref(&store), &CacheKey::get(&url))
                .await
            {
                debug!(url = %request.url(), root = %url, "Serving cached root document for navigation");
                return response;
            }
        }

        fallback::offline_page()
    }

    /// First hit across `stores`, in order. Unavailable stores are skipped.
    pub async fn lookup(&self, stores: &[String], key: &CacheKey) -> Option<Response> {
        for name in stores {
            let store = match self.registry.open(name).await {
                Ok(store) => store,
                Err(e) => {
                    warn!(store = %name, error = %e, "Store unavailable, skipping");
                    continue;
                }
            };

            match store.get(key).await {
                Ok(Some(entry)) => {
                    debug!(store = %name, url = %key.url, "Cache hit");
                    return Some(entry.to_response(name));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(store = %name, url = %key.url, error = %e, "Cache read failed, skipping store");
                }
            }
        }
        debug!(url = %key.url, stores = ?stores, "Cache miss");
        None
    }

    /// Write a response into each of `stores`. Failures are logged and leave
    /// the other stores untouched. Returns how many stores took the entry.
    pub async fn write_through(&self, stores: &[String], key: &CacheKey, response: &Response) -> usize {
        let mut written = 0;
        for name in stores {
            let result = match self.registry.open(name).await {
                Ok(store) => store.put(CacheEntry::new(key.clone(), response)).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    debug!(store = %name, url = %key.url, "Cached response");
                    written += 1;
                }
                Err(CacheError::StaleHandle(_)) => {
                    debug!(store = %name, url = %key.url, "Store deleted during write, entry dropped");
                }
                Err(e) => warn!(store = %name, url = %key.url, error = %e, "Failed to cache response"),
            }
        }
        written
    }
}

fn log_fetch_failure(url: &Url, error: &FetchError) {
    match error {
        FetchError::Offline => debug!(url = %url, "Offline, network skipped"),
        _ => warn!(url = %url, error = %error, "Network fetch failed"),
    }
}
