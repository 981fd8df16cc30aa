//! Audio response repair.
//!
//! Object-storage origins often serve audio as `application/octet-stream` or
//! hide headers behind opaque responses. Media elements refuse to seek such
//! responses, so audio is re-wrapped with a playable set of headers before it
//! is stored or returned.

use reqwest::StatusCode;
use reqwest::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue,
};
use url::Url;

use crate::classify::extension_of;
use crate::response::{Response, ResponseType};

/// Media type for an audio URL, from its extension
pub fn audio_mime_type(url: &Url) -> &'static str {
    match extension_of(url.path()).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        _ => "audio/mpeg",
    }
}

/// Whether an audio response needs to be re-wrapped before use
pub fn needs_repair(response: &Response) -> bool {
    response.is_opaque()
        || !response
            .content_type()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("audio/"))
}

/// Re-wrap an audio body with a content type derived from `url` and headers
/// that allow seeking and long-lived caching. The result is a plain `200`.
pub fn repair_audio(response: Response, url: &Url) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(audio_mime_type(url)));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(response.body.len()));
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000"),
    );

    Response::new(StatusCode::OK, headers, response.body)
        .with_response_type(ResponseType::Basic)
        .with_served_from(response.served_from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://accfree.nextaudioguides.com{path}")).unwrap()
    }

    #[test]
    fn test_mime_by_extension() {
        assert_eq!(audio_mime_type(&url("/audio/en/a.mp3")), "audio/mpeg");
        assert_eq!(audio_mime_type(&url("/audio/en/a.WAV")), "audio/wav");
        assert_eq!(audio_mime_type(&url("/audio/en/a.ogg")), "audio/ogg");
        assert_eq!(audio_mime_type(&url("/audio/en/a.m4a")), "audio/mp4");
        assert_eq!(audio_mime_type(&url("/audio/en/a.aac")), "audio/aac");
        assert_eq!(audio_mime_type(&url("/audio/en/Audio-Track-7")), "audio/mpeg");
    }

    #[test]
    fn test_repair_opaque_body() {
        let opaque = Response::new(StatusCode::OK, HeaderMap::new(), Bytes::from_static(b"ID3abc"))
            .with_response_type(ResponseType::Opaque);
        assert!(needs_repair(&opaque));

        let repaired = repair_audio(opaque, &url("/audio/it/track.ogg"));
        assert_eq!(repaired.status, StatusCode::OK);
        assert!(!repaired.is_opaque());
        assert_eq!(repaired.content_type(), Some("audio/ogg"));
        assert_eq!(repaired.header("content-length"), Some("6"));
        assert_eq!(repaired.header("accept-ranges"), Some("bytes"));
        assert_eq!(
            repaired.header("cache-control"),
            Some("public, max-age=31536000")
        );
        assert_eq!(repaired.body, Bytes::from_static(b"ID3abc"));
    }

    #[test]
    fn test_correct_audio_is_left_alone() {
        let ok = Response::ok("audio/mpeg", Bytes::from_static(b"ID3"));
        assert!(!needs_repair(&ok));

        let octet = Response::ok("application/octet-stream", Bytes::from_static(b"ID3"));
        assert!(needs_repair(&octet));

        let bare = Response::new(StatusCode::OK, HeaderMap::new(), Bytes::new());
        assert!(needs_repair(&bare));
    }
}
