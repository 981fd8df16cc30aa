//! # Network Fetcher
//!
//! Single entry point for everything the engine sends to the network. Decides
//! whether a request is made in opaque mode, validates status codes of
//! introspectable responses, and repairs audio bodies.

pub mod fallback;
pub mod repair;
pub mod transport;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::header::{ACCEPT, HeaderValue};
use tracing::{debug, warn};

use crate::classify::ContentClass;
use crate::config::EngineConfig;
use crate::error::FetchError;
use crate::request::{RequestDescriptor, RequestMode};
use crate::response::{Response, ResponseType};

pub use fallback::AudioFailure;
pub use transport::{HttpTransport, Transport, create_client};

const AUDIO_ACCEPT: &str = "audio/mpeg, audio/mp3, audio/*";

pub struct NetworkFetcher {
    transport: Arc<dyn Transport>,
    config: Arc<EngineConfig>,
    online: AtomicBool,
}

impl NetworkFetcher {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<EngineConfig>) -> Self {
        Self {
            transport,
            config,
            online: AtomicBool::new(true),
        }
    }

    /// Connectivity as last reported by the host
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    /// Audio and images from an allowed external origin are fetched without
    /// trusting the status line.
    pub fn is_opaque_request(&self, request: &RequestDescriptor, class: ContentClass) -> bool {
        matches!(class, ContentClass::Audio | ContentClass::Image)
            && !self.config.is_same_origin(request.url())
            && self.config.is_allowed_external(request.url())
    }

    /// Fetch `request` on behalf of a content class.
    ///
    /// Opaque responses are returned as-is, other responses must carry a 2xx
    /// status. Audio responses come back repaired when their headers are not
    /// playable.
    pub async fn fetch(
        &self,
        request: &RequestDescriptor,
        class: ContentClass,
    ) -> Result<Response, FetchError> {
        if !self.is_online() {
            return Err(FetchError::Offline);
        }

        let opaque = self.is_opaque_request(request, class);
        let mut outbound = request.clone();
        if opaque {
            outbound = outbound.with_mode(RequestMode::NoCors);
        }
        if class == ContentClass::Audio {
            outbound = outbound.with_header(ACCEPT, HeaderValue::from_static(AUDIO_ACCEPT));
        }

        let response = self.transport.send(&outbound).await?;

        let response = if opaque {
            debug!(url = %request.url(), class = %class, "Opaque response accepted");
            response.with_response_type(ResponseType::Opaque)
        } else {
            response
        };
        if !response.is_usable() {
            debug!(url = %request.url(), status = response.status.as_u16(), "Upstream error");
            return Err(FetchError::UpstreamError(response.status));
        }

        if class == ContentClass::Audio && repair::needs_repair(&response) {
            debug!(url = %request.url(), "Repairing audio response headers");
            return Ok(repair::repair_audio(response, request.url()));
        }

        Ok(response)
    }

    /// Send a request straight through, without status validation or repair.
    /// Used for requests that bypass the caches, e.g. audio byte ranges.
    pub async fn forward(&self, request: &RequestDescriptor) -> Result<Response, FetchError> {
        if !self.is_online() {
            return Err(FetchError::Offline);
        }
        self.transport.send(request).await.inspect_err(|e| {
            warn!(url = %request.url(), error = %e, "Forwarded request failed");
        })
    }
}
