use reqwest::StatusCode;

/// Errors raised by the store registry and its backends.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A store could not be opened, read or written.
    #[error("Store '{store}' unavailable: {source}")]
    StorageUnavailable {
        store: String,
        #[source]
        source: std::io::Error,
    },

    /// The handle refers to a store that was deleted after it was opened.
    #[error("Store '{0}' was deleted while a write was in flight")]
    StaleHandle(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub(crate) fn unavailable(store: impl Into<String>, source: std::io::Error) -> Self {
        Self::StorageUnavailable {
            store: store.into(),
            source,
        }
    }
}

/// Errors raised while talking to the network.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be attempted or the transport failed.
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The device is flagged offline, no attempt was made.
    #[error("Device is offline")]
    Offline,

    /// The upstream answered with a non-success status.
    #[error("Upstream returned status code {0}")]
    UpstreamError(StatusCode),

    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl FetchError {
    /// Status reported by the upstream, if the transport got that far.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            Self::UpstreamError(status) => Some(*status),
            Self::HttpError(e) => e.status(),
            _ => None,
        }
    }
}

/// Umbrella error for engine construction and host-facing operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed control message: {0}")]
    ControlMessage(#[from] serde_json::Error),
}
