//! # Request Classification
//!
//! Maps a [`RequestDescriptor`] to a [`ContentClass`] and pulls out the
//! metadata the dispatcher needs: language, range flag, thumbnail flag and
//! exhibit id. Classification is pure and never fails; anything unmatched is
//! treated as application shell.
//!
//! The routing table is data ([`RoutingRules`]) so hosts can swap it out and
//! tests can exercise it directly.

use std::fmt;

use regex::Regex;

use crate::request::{Destination, RequestDescriptor};

/// Coarse category that selects the caching strategy and the store set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentClass {
    Audio,
    Image,
    Data,
    Shell,
}

impl ContentClass {
    pub const ALL: [ContentClass; 4] = [Self::Audio, Self::Image, Self::Data, Self::Shell];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Data => "data",
            Self::Shell => "shell",
        }
    }
}

impl fmt::Display for ContentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-letter language code taken from the URL path, or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LanguageTag {
    Code(String),
    #[default]
    Unknown,
}

impl LanguageTag {
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(code) => Some(code),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Code(_))
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or("unknown"))
    }
}

/// Everything the dispatcher learns about a request before touching a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub class: ContentClass,
    pub language: LanguageTag,
    pub is_range: bool,
    pub is_thumbnail: bool,
    /// Exhibit id, when the URL follows `ID-{n}` or `exhibit-{n}`.
    pub entity_id: Option<u64>,
}

impl Classification {
    /// The alternate-URL probe needs all three of these.
    pub fn can_probe_alternates(&self) -> bool {
        self.is_thumbnail && self.entity_id.is_some() && self.language.is_known()
    }
}

/// URL routing rules, first match wins: audio, image, data, then shell.
#[derive(Debug, Clone)]
pub struct RoutingRules {
    pub audio_markers: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub image_markers: Vec<String>,
    pub image_extensions: Vec<String>,
    pub data_marker: String,
    pub data_extension: String,
    pub thumbnail_marker: String,
    audio_language: Regex,
    image_language: Regex,
    entity_id: Regex,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self::new(
            r"/audio/([a-z]{2})/",
            r"/(?:images|thumbnail|thumb)/([a-z]{2})/",
            r"ID-(\d+)|exhibit-(\d+)",
        )
        .expect("built-in routing patterns are valid")
    }
}

impl RoutingRules {
    /// Build rules with the default markers and the given extraction patterns.
    ///
    /// Language patterns must capture the code in group 1; the entity pattern
    /// may use any number of groups, the first one that matched wins.
    pub fn new(
        audio_language: &str,
        image_language: &str,
        entity_id: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            audio_markers: vec!["/audio/".into(), "Audio-Track-".into()],
            audio_extensions: vec!["mp3".into(), "wav".into(), "ogg".into()],
            image_markers: vec!["/images/".into(), "/thumbnail/".into(), "/thumb".into()],
            image_extensions: ["jpg", "jpeg", "png", "gif", "svg", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            data_marker: "/data/".into(),
            data_extension: "json".into(),
            thumbnail_marker: "thumb".into(),
            audio_language: Regex::new(audio_language)?,
            image_language: Regex::new(image_language)?,
            entity_id: Regex::new(entity_id)?,
        })
    }

    /// Content class for a URL path and destination hint.
    pub fn class_for(&self, path: &str, destination: Destination) -> ContentClass {
        let extension = extension_of(path);
        let has_extension = |list: &[String]| {
            extension
                .as_deref()
                .is_some_and(|ext| list.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        };

        if self.audio_markers.iter().any(|m| path.contains(m.as_str()))
            || has_extension(&self.audio_extensions)
        {
            return ContentClass::Audio;
        }

        if self.image_markers.iter().any(|m| path.contains(m.as_str()))
            || has_extension(&self.image_extensions)
            || destination == Destination::Image
        {
            return ContentClass::Image;
        }

        if path.contains(self.data_marker.as_str())
            && extension
                .as_deref()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.data_extension))
        {
            return ContentClass::Data;
        }

        ContentClass::Shell
    }

    fn language_for(&self, class: ContentClass, path: &str) -> LanguageTag {
        let pattern = match class {
            ContentClass::Audio => &self.audio_language,
            ContentClass::Image => &self.image_language,
            _ => return LanguageTag::Unknown,
        };

        pattern
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| LanguageTag::Code(m.as_str().to_string()))
            .unwrap_or_default()
    }

    fn entity_id_for(&self, path: &str) -> Option<u64> {
        let caps = self.entity_id.captures(path)?;
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Classify a request. Pure; unmatched requests become `Shell`.
    pub fn classify(&self, request: &RequestDescriptor) -> Classification {
        let path = request.url().path();
        let class = self.class_for(path, request.destination());

        Classification {
            class,
            language: self.language_for(class, path),
            is_range: request.is_range(),
            is_thumbnail: path.contains(self.thumbnail_marker.as_str()),
            entity_id: self.entity_id_for(path),
        }
    }
}

/// Lowercase-insensitive extension of the last path segment, if any.
pub(crate) fn extension_of(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(url: &str) -> Classification {
        RoutingRules::default().classify(&RequestDescriptor::parse(url).unwrap())
    }

    #[test]
    fn test_audio_routes() {
        let c = classify("https://guide.example/assets/audio/en/Audio-Track-3.mp3");
        assert_eq!(c.class, ContentClass::Audio);
        assert_eq!(c.language, LanguageTag::Code("en".into()));
        assert_eq!(c.entity_id, None);
        assert!(!c.is_range);

        assert_eq!(
            classify("https://guide.example/Audio-Track-7").class,
            ContentClass::Audio
        );
        assert_eq!(
            classify("https://guide.example/media/intro.OGG").class,
            ContentClass::Audio
        );
        assert_eq!(
            classify("https://guide.example/media/intro.wav").language,
            LanguageTag::Unknown
        );
    }

    #[test]
    fn test_image_routes() {
        let c = classify("https://cdn.example/assets/thumbnail/it/ID-12-thumbnail.jpg");
        assert_eq!(c.class, ContentClass::Image);
        assert_eq!(c.language.to_string(), "it");
        assert!(c.is_thumbnail);
        assert_eq!(c.entity_id, Some(12));
        assert!(c.can_probe_alternates());

        let c = classify("https://cdn.example/assets/thumb/fr/ID-4-thumbnail.jpg");
        assert_eq!(c.class, ContentClass::Image);
        assert_eq!(c.language.to_string(), "fr");

        let c = classify("https://guide.example/assets/images/en/exhibit-42.webp");
        assert_eq!(c.class, ContentClass::Image);
        assert!(!c.is_thumbnail);
        assert_eq!(c.entity_id, Some(42));
        assert!(!c.can_probe_alternates());

        assert_eq!(
            classify("https://guide.example/assets/Logo-New.jpg").class,
            ContentClass::Image
        );
    }

    #[test]
    fn test_destination_hint_is_secondary() {
        let rules = RoutingRules::default();
        let req = RequestDescriptor::parse("https://guide.example/render?id=3")
            .unwrap()
            .with_destination(Destination::Image);
        assert_eq!(rules.classify(&req).class, ContentClass::Image);

        // URL patterns win over the hint.
        let req = RequestDescriptor::parse("https://guide.example/assets/audio/en/a.mp3")
            .unwrap()
            .with_destination(Destination::Image);
        assert_eq!(rules.classify(&req).class, ContentClass::Audio);
    }

    #[test]
    fn test_data_and_shell_routes() {
        assert_eq!(
            classify("https://guide.example/data/exhibits.json").class,
            ContentClass::Data
        );
        // JSON outside /data/ is shell.
        assert_eq!(
            classify("https://guide.example/manifest.json").class,
            ContentClass::Shell
        );
        // /data/ without json is shell.
        assert_eq!(
            classify("https://guide.example/data/readme.txt").class,
            ContentClass::Shell
        );

        let c = classify("https://guide.example/");
        assert_eq!(c.class, ContentClass::Shell);
        assert_eq!(c.language, LanguageTag::Unknown);
        assert_eq!(c.entity_id, None);
    }

    #[test]
    fn test_range_flag() {
        let req = RequestDescriptor::parse("https://guide.example/assets/audio/en/a.mp3")
            .unwrap()
            .with_range("bytes=100-");
        assert!(RoutingRules::default().classify(&req).is_range);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("/a/b/c.MP3"), Some("mp3".to_string()));
        assert_eq!(extension_of("/a/b/"), None);
        assert_eq!(extension_of("/a/.hidden"), None);
        assert_eq!(extension_of("/a.b/c"), None);
    }
}
