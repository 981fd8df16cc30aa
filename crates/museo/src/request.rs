//! # Request Descriptors
//!
//! Read-only view of an outbound content request, as handed over by the host.

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, IntoHeaderName, RANGE};
use url::Url;

use crate::error::FetchError;

/// Kind of resource the caller expects, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    Audio,
    Image,
    Document,
    Script,
    Style,
    #[default]
    Other,
}

impl Destination {
    /// Parse a host-reported destination string. Unknown values map to `Other`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "audio" => Self::Audio,
            "image" => Self::Image,
            "document" => Self::Document,
            "script" => Self::Script,
            "style" => Self::Style,
            _ => Self::Other,
        }
    }
}

/// Request mode reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// An intercepted request. Immutable once built.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    url: Url,
    method: Method,
    headers: HeaderMap,
    destination: Destination,
    mode: RequestMode,
}

impl RequestDescriptor {
    /// A plain GET for the given absolute URL.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            destination: Destination::Other,
            mode: RequestMode::Cors,
        }
    }

    /// Parse `url` and build a GET descriptor for it.
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let url = Url::parse(url).map_err(|e| FetchError::UrlError(format!("{url}: {e}")))?;
        Ok(Self::get(url))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Add a `Range` header, e.g. `bytes=0-1023`.
    pub fn with_range(self, range: &str) -> Self {
        match HeaderValue::from_str(range) {
            Ok(value) => self.with_header(RANGE, value),
            Err(_) => self,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn is_range(&self) -> bool {
        self.headers.contains_key(RANGE)
    }

    /// Navigation requests are either flagged by the host or ask for HTML.
    pub fn is_navigation(&self) -> bool {
        if self.mode == RequestMode::Navigate {
            return true;
        }
        self.headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_detection() {
        let req = RequestDescriptor::parse("https://guide.example/exhibits").unwrap();
        assert!(!req.is_navigation());

        let nav = req.clone().with_mode(RequestMode::Navigate);
        assert!(nav.is_navigation());

        let html = req.with_header(ACCEPT, HeaderValue::from_static("text/html,*/*"));
        assert!(html.is_navigation());
    }

    #[test]
    fn test_range_header() {
        let req = RequestDescriptor::parse("https://guide.example/a.mp3").unwrap();
        assert!(!req.is_range());
        assert!(req.with_range("bytes=0-99").is_range());
    }

    #[test]
    fn test_destination_parse() {
        assert_eq!(Destination::parse("IMAGE"), Destination::Image);
        assert_eq!(Destination::parse("audio"), Destination::Audio);
        assert_eq!(Destination::parse("track"), Destination::Other);
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            RequestDescriptor::parse("not a url"),
            Err(FetchError::UrlError(_))
        ));
    }
}
