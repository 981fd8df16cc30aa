//! # Control Channel
//!
//! Out-of-band commands sent by the host: activate the waiting generation,
//! warm stores for a list of URLs, and clear every store.

use std::collections::BTreeMap;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheRegistry, CacheResult};
use crate::classify::{Classification, ContentClass};
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::fetch::NetworkFetcher;
use crate::request::RequestDescriptor;

/// A command on the control channel, as JSON: `{"type": "CACHE_URLS", "urls": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "SKIP_WAITING")]
    ActivateNow,
    #[serde(rename = "CACHE_URLS")]
    WarmCache {
        #[serde(default)]
        urls: Vec<String>,
    },
    #[serde(rename = "CLEAR_CACHE")]
    ClearAll,
}

impl ControlMessage {
    /// Parse a message. The bare string `"SKIP_WAITING"` is accepted too.
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if value.as_str() == Some("SKIP_WAITING") {
            return Ok(Self::ActivateNow);
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// What handling a control message did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlOutcome {
    Activated,
    Warmed(WarmReport),
    /// Names of the deleted stores
    Cleared(Vec<String>),
}

/// Per-URL result of a warm command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub cached: Vec<String>,
    /// Fetched fine but never stored, e.g. analytics endpoints
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// What warming a single URL did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Warmed {
    Cached,
    Skipped,
    Failed,
}

impl WarmReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch every URL and write the successes into the stores its class is
/// served from. Never fails as a whole.
pub(crate) async fn warm(
    config: &EngineConfig,
    dispatcher: &Dispatcher,
    fetcher: &NetworkFetcher,
    urls: &[String],
) -> WarmReport {
    let mut report = WarmReport::default();
    let mut groups: BTreeMap<ContentClass, Vec<(RequestDescriptor, Classification)>> =
        BTreeMap::new();

    for raw in urls {
        let url = match config.resolve_url(raw) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %raw, error = %e, "Skipping invalid warm URL");
                report.failed.push(raw.clone());
                continue;
            }
        };
        let request = RequestDescriptor::get(url);
        let class = config.routing.classify(&request);
        groups.entry(class.class).or_default().push((request, class));
    }

    for (class, requests) in groups {
        let total = requests.len();
        let results = futures::stream::iter(requests)
            .map(|(request, classification)| async move {
                let warmed = warm_one(config, dispatcher, fetcher, &request, &classification).await;
                (request, warmed)
            })
            .buffer_unordered(config.warm_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut cached = 0;
        for (request, warmed) in results {
            let url = request.url().to_string();
            match warmed {
                Warmed::Cached => {
                    cached += 1;
                    report.cached.push(url);
                }
                Warmed::Skipped => report.skipped.push(url),
                Warmed::Failed => report.failed.push(url),
            }
        }
        info!(class = %class, cached, total, "Warmed stores");
    }

    report
}

async fn warm_one(
    config: &EngineConfig,
    dispatcher: &Dispatcher,
    fetcher: &NetworkFetcher,
    request: &RequestDescriptor,
    class: &Classification,
) -> Warmed {
    let response = match fetcher.fetch(request, class.class).await {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %request.url(), error = %e, "Failed to warm URL");
            return Warmed::Failed;
        }
    };

    let stores = match class.class {
        ContentClass::Audio | ContentClass::Image => dispatcher.write_targets(class),
        ContentClass::Data => vec![config.data_store()],
        ContentClass::Shell if config.is_storable_shell(request.url()) => vec![config.shell_store()],
        ContentClass::Shell => {
            debug!(url = %request.url(), "Shell URL excluded from caching");
            return Warmed::Skipped;
        }
    };

    let written = dispatcher
        .write_through(&stores, &CacheKey::from_request(request), &response)
        .await;
    if written == 0 {
        warn!(url = %request.url(), "Warmed URL could not be stored");
        return Warmed::Failed;
    }
    Warmed::Cached
}

/// Delete every store the registry knows about
pub(crate) async fn clear_all(registry: &CacheRegistry) -> CacheResult<Vec<String>> {
    let mut deleted = Vec::new();
    for name in registry.list_names().await? {
        match registry.delete(&name).await {
            Ok(true) => deleted.push(name),
            Ok(false) => {}
            Err(e) => warn!(store = %name, error = %e, "Failed to delete store"),
        }
    }
    info!(count = deleted.len(), "Cleared all stores");
    Ok(deleted)
}
