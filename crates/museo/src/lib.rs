//! # Museo
//!
//! Offline content cache engine for a mobile museum guide. Intercepts the
//! app's content requests and answers them from persistent, class-specific
//! stores before falling back to the network, so audio tracks, imagery and
//! exhibit data stay usable without connectivity.
//!
//! ## Features
//!
//! - Request classification into audio, image, data and shell content
//! - Per-class strategies: cache first, stale-while-revalidate, network first
//! - Language-scoped stores with ordered fallbacks and legacy store lookup
//! - Audio response repair and deterministic offline fallbacks
//! - Versioned stores reconciled on activation
//! - Control messages for cache warming and clearing
//! - In-memory (moka) and file-backed store backends

pub mod builder;
pub mod cache;
pub mod classify;
pub mod config;
pub mod control;
mod dispatch;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod request;
pub mod response;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::EngineConfigBuilder;
pub use cache::{CacheRegistry, StorageConfig, Store};
pub use classify::{Classification, ContentClass, LanguageTag, RoutingRules};
pub use config::{EngineConfig, FetcherConfig};
pub use control::{ControlMessage, ControlOutcome, WarmReport};
pub use engine::{Engine, Interception};
pub use error::{CacheError, EngineError, FetchError};
pub use fetch::{HttpTransport, Transport, create_client};
pub use lifecycle::WorkerState;
pub use request::{Destination, RequestDescriptor, RequestMode};
pub use response::{Response, ResponseType, ServedFrom};
