//! # Responses
//!
//! The response type returned to hosts, whether it came from a store, the
//! network or a synthesized fallback.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

/// Whether status and headers of a network response can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Fully introspectable response.
    #[default]
    Basic,
    /// Fetched from an untrusted-status origin; assumed successful.
    Opaque,
}

/// Where a response was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServedFrom {
    /// Read from the named store.
    Cache(String),
    Network,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub response_type: ResponseType,
    pub served_from: ServedFrom,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            response_type: ResponseType::Basic,
            served_from: ServedFrom::Network,
        }
    }

    /// A `200 OK` with a single content type header.
    pub fn ok(content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self::new(StatusCode::OK, headers, body)
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_served_from(mut self, served_from: ServedFrom) -> Self {
        self.served_from = served_from;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_opaque(&self) -> bool {
        self.response_type == ResponseType::Opaque
    }

    /// Opaque responses count as successful since their status is unknowable.
    pub fn is_usable(&self) -> bool {
        self.is_opaque() || self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    pub fn is_from_cache(&self) -> bool {
        matches!(self.served_from, ServedFrom::Cache(_))
    }

    pub fn is_fallback(&self) -> bool {
        self.served_from == ServedFrom::Fallback
    }
}
