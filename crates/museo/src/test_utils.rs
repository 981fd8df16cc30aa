//! Helpers shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::error::FetchError;
use crate::fetch::Transport;
use crate::request::RequestDescriptor;
use crate::response::Response;

macro_rules! init_test_tracing {
    () => {
        init_test_tracing!(DEBUG);
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}

pub(crate) use init_test_tracing;

#[derive(Clone)]
enum Scripted {
    Respond(Response, Option<Duration>),
    Unreachable,
}

/// Transport answering from a URL table. Unknown URLs are unreachable.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<HashMap<String, Scripted>>,
    sent: Mutex<Vec<RequestDescriptor>>,
    count: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.script
            .lock()
            .insert(url.to_string(), Scripted::Respond(response, None));
    }

    /// Respond only after `delay` has passed
    pub fn respond_after(&self, url: &str, response: Response, delay: Duration) {
        self.script
            .lock()
            .insert(url.to_string(), Scripted::Respond(response, Some(delay)));
    }

    pub fn respond_ok(&self, url: &str, content_type: &'static str, body: &'static [u8]) {
        self.respond(url, Response::ok(content_type, Bytes::from_static(body)));
    }

    pub fn respond_status(&self, url: &str, status: StatusCode) {
        self.respond(url, Response::new(status, Default::default(), Bytes::new()));
    }

    pub fn unreachable(&self, url: &str) {
        self.script.lock().insert(url.to_string(), Scripted::Unreachable);
    }

    pub fn fetch_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response, FetchError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(request.clone());

        let scripted = self.script.lock().get(request.url().as_str()).cloned();
        match scripted {
            Some(Scripted::Respond(response, delay)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(response)
            }
            Some(Scripted::Unreachable) | None => Err(FetchError::NetworkUnreachable(
                request.url().to_string(),
            )),
        }
    }
}
