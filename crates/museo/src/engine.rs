//! # Engine
//!
//! The pipeline object a host drives. It owns the store registry, the
//! network fetcher and the worker state, and exposes one call per event the
//! host forwards: install, activate, an intercepted request, or a control
//! message.
//!
//! Each intercepted request runs as its own task, so a host that stops
//! waiting for a response does not stop the fetch or the store write made on
//! its behalf.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Method;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::CacheRegistry;
use crate::classify::{Classification, ContentClass};
use crate::config::EngineConfig;
use crate::control::{self, ControlMessage, ControlOutcome, WarmReport};
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, FetchError};
use crate::fetch::{AudioFailure, HttpTransport, NetworkFetcher, Transport, fallback};
use crate::lifecycle::{LifecycleManager, WorkerState};
use crate::request::RequestDescriptor;
use crate::response::Response;

/// What the engine did with an intercepted request
#[derive(Debug)]
pub enum Interception {
    /// Not handled; the host performs the request itself
    Passthrough,
    /// Answered from a store, the network or a fallback
    Served(Response),
    /// Sent straight to the network without touching any store
    Forwarded(Result<Response, FetchError>),
}

impl Interception {
    /// The response, if the engine produced or forwarded one
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Served(response) => Some(response),
            Self::Forwarded(Ok(response)) => Some(response),
            Self::Forwarded(Err(_)) | Self::Passthrough => None,
        }
    }
}

struct EngineInner {
    config: Arc<EngineConfig>,
    registry: CacheRegistry,
    fetcher: Arc<NetworkFetcher>,
    dispatcher: Dispatcher,
    lifecycle: LifecycleManager,
    tracker: TaskTracker,
    state: RwLock<WorkerState>,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Engine talking to the network over HTTP, with stores as configured
    pub async fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let transport = HttpTransport::new(&config.fetcher)?;
        let registry = CacheRegistry::from_config(&config.storage).await?;
        Ok(Self::with_parts(config, registry, Arc::new(transport)))
    }

    /// Engine over an existing registry and transport
    pub fn with_parts(
        config: EngineConfig,
        registry: CacheRegistry,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let config = Arc::new(config);
        let fetcher = Arc::new(NetworkFetcher::new(transport, config.clone()));
        let tracker = TaskTracker::new();
        let dispatcher = Dispatcher::new(
            config.clone(),
            registry.clone(),
            fetcher.clone(),
            tracker.clone(),
        );
        let lifecycle = LifecycleManager::new(config.clone(), registry.clone());

        Self {
            inner: Arc::new(EngineInner {
                config,
                registry,
                fetcher,
                dispatcher,
                lifecycle,
                tracker,
                state: RwLock::new(WorkerState::Installing),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> WorkerState {
        *self.inner.state.read()
    }

    pub fn is_online(&self) -> bool {
        self.inner.fetcher.is_online()
    }

    /// Record a connectivity change reported by the host
    pub fn set_online(&self, online: bool) {
        info!(online, "Connectivity changed");
        self.inner.fetcher.set_online(online);
    }

    /// Precache the shell. With `skip_waiting` the engine activates right away.
    pub async fn install(&self) -> Result<WorkerState, EngineError> {
        *self.inner.state.write() = WorkerState::Installing;
        let cached = self.inner.lifecycle.precache(&self.inner.fetcher).await;
        *self.inner.state.write() = WorkerState::Installed;
        info!(cached, "Installed");

        if self.inner.config.skip_waiting {
            self.activate().await?;
        }
        Ok(self.state())
    }

    /// Drop outdated stores, then start intercepting. Returns the deleted
    /// store names; empty when already active.
    pub async fn activate(&self) -> Result<Vec<String>, EngineError> {
        if self.state() == WorkerState::Activated {
            return Ok(Vec::new());
        }

        let current = self.inner.config.current_store_names();
        let deleted = self.inner.lifecycle.reconcile(&current).await?;
        *self.inner.state.write() = WorkerState::Activated;
        info!(deleted = deleted.len(), "Activated");
        Ok(deleted)
    }

    /// Resume a generation that was activated by an earlier process. Stores
    /// are left as they are.
    pub fn resume(&self) {
        *self.inner.state.write() = WorkerState::Activated;
        debug!("Resumed activated generation");
    }

    /// Handle an intercepted request
    pub async fn handle(&self, request: RequestDescriptor) -> Interception {
        if self.state() != WorkerState::Activated {
            debug!(url = %request.url(), state = %self.state(), "Not active, passing through");
            return Interception::Passthrough;
        }

        if *request.method() != Method::GET || !self.inner.config.is_intercepted_origin(request.url())
        {
            return Interception::Passthrough;
        }

        let class = self.inner.config.routing.classify(&request);
        if class.class == ContentClass::Audio && class.is_range {
            debug!(url = %request.url(), "Range request for audio, bypassing caches");
            return Interception::Forwarded(self.inner.fetcher.forward(&request).await);
        }

        let dispatcher = self.inner.dispatcher.clone();
        let task_class = class.clone();
        let pipeline = self
            .inner
            .tracker
            .spawn(async move { dispatcher.dispatch(&request, &task_class).await });

        match pipeline.await {
            Ok(response) => Interception::Served(response),
            Err(e) => {
                warn!(error = %e, "Request pipeline failed");
                Interception::Served(last_resort(&class))
            }
        }
    }

    /// Handle a control message
    pub async fn handle_message(&self, message: ControlMessage) -> Result<ControlOutcome, EngineError> {
        match message {
            ControlMessage::ActivateNow => {
                self.activate().await?;
                Ok(ControlOutcome::Activated)
            }
            ControlMessage::WarmCache { urls } => Ok(ControlOutcome::Warmed(self.warm(&urls).await)),
            ControlMessage::ClearAll => Ok(ControlOutcome::Cleared(
                control::clear_all(&self.inner.registry).await?,
            )),
        }
    }

    /// Parse and handle a JSON control message
    pub async fn handle_json(&self, raw: &str) -> Result<ControlOutcome, EngineError> {
        self.handle_message(ControlMessage::from_json(raw)?).await
    }

    /// Populate stores for `urls`. Runs to completion even if the caller
    /// stops waiting.
    pub async fn warm(&self, urls: &[String]) -> WarmReport {
        info!(count = urls.len(), "Warming stores");
        let inner = self.inner.clone();
        let urls = urls.to_vec();
        let task = self.inner.tracker.spawn(async move {
            control::warm(&inner.config, &inner.dispatcher, &inner.fetcher, &urls).await
        });

        match task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Warm task failed");
                WarmReport::default()
            }
        }
    }

    /// Wait for every spawned pipeline and background refresh to finish
    pub async fn wait_background(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}

fn last_resort(class: &Classification) -> Response {
    match class.class {
        ContentClass::Audio => fallback::audio_unavailable(&class.language, AudioFailure::Offline),
        ContentClass::Image => fallback::image_placeholder(class.entity_id, class.is_thumbnail),
        ContentClass::Data => fallback::data_unavailable(),
        ContentClass::Shell => fallback::shell_unavailable(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheKey};
    use crate::request::RequestMode;
    use crate::response::ServedFrom;
    use crate::test_utils::{ScriptedTransport, init_test_tracing};
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::time::Duration;
    use url::Url;

    const APP: &str = "http://localhost:5173";
    const ASSETS: &str = "https://accfree.nextaudioguides.com";

    async fn active_engine() -> (Engine, Arc<ScriptedTransport>) {
        init_test_tracing!();
        let transport = Arc::new(ScriptedTransport::new());
        let engine = Engine::with_parts(
            EngineConfig::default(),
            CacheRegistry::in_memory(1024 * 1024),
            transport.clone(),
        );
        engine.activate().await.unwrap();
        (engine, transport)
    }

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::parse(url).unwrap()
    }

    async fn cached_body(engine: &Engine, store: &str, url: &str) -> Option<Bytes> {
        let key = CacheKey::get(&Url::parse(url).unwrap());
        engine
            .registry()
            .open(store)
            .await
            .unwrap()
            .get(&key)
            .await
            .unwrap()
            .map(|entry| entry.data)
    }

    #[tokio::test]
    async fn test_range_audio_bypasses_caches() {
        let (engine, transport) = active_engine().await;
        let url = format!("{ASSETS}/audio/en/Audio-Track-3.mp3");
        transport.respond(
            &url,
            Response::new(StatusCode::PARTIAL_CONTENT, Default::default(), Bytes::from_static(b"ID")),
        );

        let outcome = engine.handle(get(&url).with_range("bytes=0-1")).await;
        let Interception::Forwarded(Ok(response)) = outcome else {
            panic!("range request was not forwarded: {outcome:?}");
        };
        assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(transport.fetch_count(), 1);
        assert!(engine.registry().list_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_origin_and_non_get_pass_through() {
        let (engine, transport) = active_engine().await;

        let foreign = engine.handle(get("https://tiles.example/map.png")).await;
        assert!(matches!(foreign, Interception::Passthrough));

        let post = engine
            .handle(get(&format!("{APP}/data/feedback.json")).with_method(Method::POST))
            .await;
        assert!(matches!(post, Interception::Passthrough));
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_requests_before_activation_pass_through() {
        init_test_tracing!();
        let transport = Arc::new(ScriptedTransport::new());
        let config = EngineConfig::builder().with_skip_waiting(false).build().unwrap();
        let engine = Engine::with_parts(config, CacheRegistry::in_memory(1024 * 1024), transport);

        assert_eq!(engine.install().await.unwrap(), WorkerState::Installed);
        assert!(matches!(
            engine.handle(get(&format!("{APP}/index.html"))).await,
            Interception::Passthrough
        ));

        let outcome = engine.handle_json(r#""SKIP_WAITING""#).await.unwrap();
        assert_eq!(outcome, ControlOutcome::Activated);
        assert_eq!(engine.state(), WorkerState::Activated);
        assert!(matches!(
            engine.handle(get(&format!("{APP}/index.html"))).await,
            Interception::Served(_)
        ));
    }

    #[tokio::test]
    async fn test_install_precaches_and_activates() {
        init_test_tracing!();
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_ok(&format!("{APP}/index.html"), "text/html", b"<html>guide</html>");
        let registry = CacheRegistry::in_memory(1024 * 1024);
        registry.open("shell-cache-v5").await.unwrap();

        let engine = Engine::with_parts(EngineConfig::default(), registry, transport);
        assert_eq!(engine.install().await.unwrap(), WorkerState::Activated);
        assert!(!engine.registry().has("shell-cache-v5").await.unwrap());

        // Offline navigation is answered from the precached root document.
        engine.set_online(false);
        let navigation = get(&format!("{APP}/exhibits/david")).with_mode(RequestMode::Navigate);
        let response = engine.handle(navigation).await.into_response().unwrap();
        assert_eq!(response.body, Bytes::from_static(b"<html>guide</html>"));
    }

    #[tokio::test]
    async fn test_warmed_urls_are_served_without_network() {
        let (engine, transport) = active_engine().await;
        let audio = format!("{ASSETS}/audio/it/Audio-Track-5.mp3");
        let image = format!("{ASSETS}/assets/images/it/ID-5-main.jpg");
        transport.respond_ok(&audio, "audio/mpeg", b"ID3five");
        transport.respond_ok(&image, "image/jpeg", b"jpegfive");

        let outcome = engine
            .handle_message(ControlMessage::WarmCache {
                urls: vec![audio.clone(), image.clone()],
            })
            .await
            .unwrap();
        let ControlOutcome::Warmed(report) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert!(report.is_complete());
        assert_eq!(report.cached.len(), 2);
        assert_eq!(transport.fetch_count(), 2);

        for url in [&audio, &image] {
            let response = engine.handle(get(url)).await.into_response().unwrap();
            assert!(response.is_from_cache());
        }
        assert_eq!(transport.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_warm_reports_failures_and_continues() {
        let (engine, transport) = active_engine().await;
        let good = format!("{APP}/data/rooms.json");
        transport.respond_ok(&good, "application/json", b"[]");

        let report = engine
            .warm(&[good.clone(), format!("{APP}/data/missing.json"), "http://[::1".to_string()])
            .await;
        assert_eq!(report.cached, vec![good.clone()]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(
            cached_body(&engine, "data-cache-v6", &good).await,
            Some(Bytes::from_static(b"[]"))
        );
    }

    #[tokio::test]
    async fn test_warm_reports_excluded_shell_urls_as_skipped() {
        let (engine, transport) = active_engine().await;
        let ping = format!("{APP}/analytics/ping");
        transport.respond_ok(&ping, "text/plain", b"ok");

        let report = engine.warm(&[ping.clone()]).await;
        assert!(report.cached.is_empty());
        assert_eq!(report.skipped, vec![ping.clone()]);
        assert!(report.is_complete());
        assert_eq!(cached_body(&engine, "shell-cache-v6", &ping).await, None);
    }

    #[tokio::test]
    async fn test_warm_counts_refused_writes_as_failed() {
        init_test_tracing!();
        let transport = Arc::new(ScriptedTransport::new());
        let engine = Engine::with_parts(
            EngineConfig::default(),
            CacheRegistry::in_memory(4),
            transport.clone(),
        );
        engine.activate().await.unwrap();

        let url = format!("{APP}/data/exhibits.json");
        transport.respond_ok(&url, "application/json", b"[1, 2, 3, 4]");

        let report = engine.warm(&[url.clone()]).await;
        assert!(report.cached.is_empty());
        assert_eq!(report.failed, vec![url.clone()]);
        assert_eq!(cached_body(&engine, "data-cache-v6", &url).await, None);
    }

    #[tokio::test]
    async fn test_cold_offline_thumbnail_gets_placeholder() {
        let (engine, transport) = active_engine().await;
        engine.set_online(false);

        let response = engine
            .handle(get(&format!("{APP}/images/en/ID-12-thumbnail.jpg")))
            .await
            .into_response()
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        let svg = String::from_utf8(response.body.to_vec()).unwrap();
        assert!(svg.contains("Offline: ID-12"));
        assert!(svg.contains(r#"width="150" height="100""#));
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_warm_then_offline_audio_is_served_from_cache() {
        let (engine, transport) = active_engine().await;
        let url = format!("{APP}/audio/en/Audio-Track-3.mp3");
        transport.respond_ok(&url, "application/octet-stream", b"ID3three");

        let outcome = engine
            .handle_json(r#"{"type":"CACHE_URLS","urls":["/audio/en/Audio-Track-3.mp3"]}"#)
            .await
            .unwrap();
        assert!(matches!(outcome, ControlOutcome::Warmed(ref r) if r.is_complete()));

        engine.set_online(false);
        let response = engine.handle(get(&url)).await.into_response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type(), Some("audio/mpeg"));
        assert_eq!(response.body, Bytes::from_static(b"ID3three"));
        assert!(!response.is_fallback());
    }

    #[tokio::test]
    async fn test_legacy_audio_survives_activation_and_serves_offline() {
        init_test_tracing!();
        let transport = Arc::new(ScriptedTransport::new());
        let registry = CacheRegistry::in_memory(1024 * 1024);
        let url = format!("{APP}/assets/audio/it/Audio-Track-1.mp3");
        let entry = CacheEntry::new(
            CacheKey::get(&Url::parse(&url).unwrap()),
            &Response::ok("application/octet-stream", Bytes::from_static(b"ID3legacy")),
        );
        registry.open("accademia-cache-v1").await.unwrap().put(entry).await.unwrap();
        registry.open("audio-cache-v5").await.unwrap();

        let engine = Engine::with_parts(EngineConfig::default(), registry, transport.clone());
        let deleted = engine.activate().await.unwrap();
        assert_eq!(deleted, vec!["audio-cache-v5"]);

        engine.set_online(false);
        let response = engine.handle(get(&url)).await.into_response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, Bytes::from_static(b"ID3legacy"));
        assert_eq!(response.content_type(), Some("audio/mpeg"));
        assert_eq!(
            response.served_from,
            ServedFrom::Cache("accademia-cache-v1".to_string())
        );
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_while_revalidate_returns_cached_first() {
        let (engine, transport) = active_engine().await;
        let url = format!("{APP}/data/exhibits.json");
        transport.respond_ok(&url, "application/json", b"v1");
        engine.warm(&[url.clone()]).await;

        transport.respond_after(
            &url,
            Response::ok("application/json", Bytes::from_static(b"v2")),
            Duration::from_secs(30),
        );

        let response = engine.handle(get(&url)).await.into_response().unwrap();
        assert_eq!(response.body, Bytes::from_static(b"v1"));
        assert_eq!(response.served_from, ServedFrom::Cache("data-cache-v6".to_string()));
        assert_eq!(
            cached_body(&engine, "data-cache-v6", &url).await,
            Some(Bytes::from_static(b"v1"))
        );

        engine.wait_background().await;
        assert_eq!(
            cached_body(&engine, "data-cache-v6", &url).await,
            Some(Bytes::from_static(b"v2"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_still_persists() {
        let (engine, transport) = active_engine().await;
        let url = format!("{ASSETS}/audio/de/Audio-Track-8.mp3");
        transport.respond_after(
            &url,
            Response::ok("audio/mpeg", Bytes::from_static(b"ID3eight")),
            Duration::from_secs(30),
        );

        let abandoned = tokio::time::timeout(Duration::from_secs(1), engine.handle(get(&url))).await;
        assert!(abandoned.is_err());

        engine.wait_background().await;
        assert_eq!(
            cached_body(&engine, "accademia-audio-de", &url).await,
            Some(Bytes::from_static(b"ID3eight"))
        );
    }

    #[tokio::test]
    async fn test_clear_all_deletes_every_store() {
        let (engine, transport) = active_engine().await;
        let url = format!("{APP}/data/rooms.json");
        transport.respond_ok(&url, "application/json", b"[]");
        engine.warm(&[url]).await;
        engine.registry().open("accademia-audio-en").await.unwrap();

        let outcome = engine.handle_message(ControlMessage::ClearAll).await.unwrap();
        let ControlOutcome::Cleared(mut deleted) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        deleted.sort();
        assert_eq!(deleted, vec!["accademia-audio-en", "data-cache-v6"]);
        assert!(engine.registry().list_names().await.unwrap().is_empty());
    }
}
