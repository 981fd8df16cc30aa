//! Synthesized responses for requests that neither a store nor the network
//! could satisfy. All of them are deterministic and none is ever persisted.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::json;

use crate::classify::LanguageTag;
use crate::response::{Response, ServedFrom};

const X_IS_OFFLINE: &str = "x-is-offline";
const X_LANGUAGE: &str = "x-language";

const OFFLINE_PAGE: &str =
    "<html><body><h1>App is offline</h1><p>Please check your connection.</p></body></html>";

/// Why an audio request could not be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFailure {
    /// No cached copy and the network could not be used
    Offline,
    /// The upstream reported it is unavailable (503)
    ServiceUnavailable,
}

fn fallback(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    Response::new(status, headers, body).with_served_from(ServedFrom::Fallback)
}

/// Hue of the placeholder, stable per entity
pub fn placeholder_hue(entity_id: Option<u64>) -> u64 {
    (entity_id.unwrap_or(0) % 360) * 37 % 360
}

/// SVG placeholder labelled with the entity id. Served with status 200 so
/// image elements render it.
pub fn image_placeholder(entity_id: Option<u64>, is_thumbnail: bool) -> Response {
    let (width, height) = if is_thumbnail { (150, 100) } else { (300, 200) };
    let hue = placeholder_hue(entity_id);
    let label = match entity_id {
        Some(id) => id.to_string(),
        None => "unknown".to_string(),
    };

    let svg = format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 150 100">"#,
            r#"<rect width="100%" height="100%" fill="hsl({hue}, 70%, 80%)"/>"#,
            r##"<text x="50%" y="50%" font-family="Arial" font-size="14" text-anchor="middle" fill="#333" dominant-baseline="middle">Offline: ID-{label}</text>"##,
            "</svg>"
        ),
        w = width,
        h = height,
        hue = hue,
        label = label,
    );

    fallback(StatusCode::OK, "image/svg+xml", svg)
        .with_header(HeaderName::from_static(X_IS_OFFLINE), HeaderValue::from_static("true"))
}

/// JSON error for audio that is not available
pub fn audio_unavailable(language: &LanguageTag, failure: AudioFailure) -> Response {
    let (error, message) = match failure {
        AudioFailure::Offline => (
            "offline",
            format!(
                "This {language} audio file is not available offline. Please download it when online."
            ),
        ),
        AudioFailure::ServiceUnavailable => (
            "service_unavailable",
            format!("The {language} audio service is currently unavailable. Please try again later."),
        ),
    };

    let body = json!({
        "error": error,
        "message": message,
        "language": language.to_string(),
    });

    let mut response = fallback(
        StatusCode::SERVICE_UNAVAILABLE,
        "application/json",
        body.to_string(),
    );
    if let Ok(value) = HeaderValue::from_str(&language.to_string()) {
        response = response.with_header(HeaderName::from_static(X_LANGUAGE), value);
    }
    if failure == AudioFailure::Offline {
        response = response.with_header(HeaderName::from_static(X_IS_OFFLINE), HeaderValue::from_static("true"));
    }
    response
}

pub fn data_unavailable() -> Response {
    fallback(
        StatusCode::SERVICE_UNAVAILABLE,
        "application/json",
        json!({ "error": "Data not available offline" }).to_string(),
    )
}

pub fn shell_unavailable() -> Response {
    fallback(
        StatusCode::SERVICE_UNAVAILABLE,
        "text/plain",
        "Resource not available offline",
    )
}

/// Inline page for navigations when not even the root document is cached
pub fn offline_page() -> Response {
    fallback(StatusCode::SERVICE_UNAVAILABLE, "text/html", OFFLINE_PAGE)
}
