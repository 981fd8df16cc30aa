use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::cache::StorageConfig;
use crate::classify::{ContentClass, LanguageTag, RoutingRules};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 14; Mobile) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36";
const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_ASSET_HOST: &str = "accfree.nextaudioguides.com";

/// HTTP options for the network fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Idle timeout for pooled connections
    pub pool_idle_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: FetcherConfig::get_default_headers(),
            use_system_proxy: true,
        }
    }
}

impl FetcherConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate, br"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.8,it;q=0.5"),
        );
        default_headers
    }
}

/// Everything the engine needs to know about the application it serves.
///
/// Store names, origins and routing rules are all data here; nothing in the
/// request path hard-codes them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Prefix of language-scoped store names, e.g. `accademia-audio-en`
    pub app_name: String,

    /// Origin the application itself is served from
    pub app_origin: Url,

    /// External hosts whose requests are intercepted too
    pub allowed_external_hosts: Vec<String>,

    /// Version suffix of the class stores (`audio-cache-v{N}`, ...)
    pub cache_version: u32,

    /// Stores searched for audio after the language and general stores
    pub legacy_audio_stores: Vec<String>,

    /// Store probed for alternate thumbnail URLs after the general image store
    pub legacy_image_stores: Vec<String>,

    /// Templates for the two historical thumbnail URL shapes.
    /// `{lang}` and `{id}` are substituted.
    pub thumbnail_templates: Vec<String>,

    /// Stores whose name contains one of these survive reconcile
    pub retain_patterns: Vec<String>,

    /// Shell resources fetched into the shell store at install
    pub precache_urls: Vec<String>,

    /// Paths tried, in order, for the offline navigation fallback
    pub root_documents: Vec<String>,

    /// Shell URLs containing one of these are never written to a store
    pub no_store_markers: Vec<String>,

    /// Activate right after install instead of waiting for `ActivateNow`
    pub skip_waiting: bool,

    /// Maximum number of parallel fetches while warming
    pub warm_concurrency: usize,

    pub routing: RoutingRules,
    pub storage: StorageConfig,
    pub fetcher: FetcherConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let app_name = "accademia".to_string();
        Self {
            retain_patterns: EngineConfig::default_retain_patterns(&app_name),
            app_name,
            app_origin: Url::parse(DEFAULT_APP_ORIGIN).expect("default origin is valid"),
            allowed_external_hosts: vec![DEFAULT_ASSET_HOST.to_string()],
            cache_version: 6,
            legacy_audio_stores: vec!["accademia-cache-v1".to_string()],
            legacy_image_stores: vec!["images-cache".to_string()],
            thumbnail_templates: vec![
                format!("https://{DEFAULT_ASSET_HOST}/assets/thumbnail/{{lang}}/ID-{{id}}-thumbnail.jpg"),
                format!("https://{DEFAULT_ASSET_HOST}/assets/thumb/{{lang}}/ID-{{id}}-thumbnail.jpg"),
            ],
            precache_urls: ["/", "/index.html", "/manifest.json", "/favicon.ico", "/assets/Logo-New.jpg"]
                .into_iter()
                .map(String::from)
                .collect(),
            root_documents: vec!["/index.html".to_string(), "/".to_string()],
            no_store_markers: ["/analytics", "/tracking", "/socket.io"]
                .into_iter()
                .map(String::from)
                .collect(),
            skip_waiting: true,
            warm_concurrency: 4,
            routing: RoutingRules::default(),
            storage: StorageConfig::default(),
            fetcher: FetcherConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> crate::builder::EngineConfigBuilder {
        crate::builder::EngineConfigBuilder::new()
    }

    pub(crate) fn default_retain_patterns(app_name: &str) -> Vec<String> {
        vec![
            "workbox".to_string(),
            "static-resources".to_string(),
            format!("{app_name}-audio-"),
            format!("{app_name}-images-"),
        ]
    }

    pub fn shell_store(&self) -> String {
        format!("shell-cache-v{}", self.cache_version)
    }

    pub fn audio_store(&self) -> String {
        format!("audio-cache-v{}", self.cache_version)
    }

    pub fn image_store(&self) -> String {
        format!("image-cache-v{}", self.cache_version)
    }

    pub fn data_store(&self) -> String {
        format!("data-cache-v{}", self.cache_version)
    }

    /// General versioned store of a class
    pub fn class_store(&self, class: ContentClass) -> String {
        match class {
            ContentClass::Audio => self.audio_store(),
            ContentClass::Image => self.image_store(),
            ContentClass::Data => self.data_store(),
            ContentClass::Shell => self.shell_store(),
        }
    }

    /// Unversioned per-language store, only for audio and images
    pub fn language_store(&self, class: ContentClass, language: &LanguageTag) -> Option<String> {
        let code = language.code()?;
        match class {
            ContentClass::Audio => Some(format!("{}-audio-{code}", self.app_name)),
            ContentClass::Image => Some(format!("{}-images-{code}", self.app_name)),
            _ => None,
        }
    }

    /// The versioned class stores of this deploy
    pub fn current_store_names(&self) -> BTreeSet<String> {
        ContentClass::ALL
            .iter()
            .map(|class| self.class_store(*class))
            .collect()
    }

    /// Whether requests to `url` are intercepted at all
    pub fn is_intercepted_origin(&self, url: &Url) -> bool {
        self.is_same_origin(url) || self.is_allowed_external(url)
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.app_origin.origin()
    }

    pub fn is_allowed_external(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.allowed_external_hosts.iter().any(|allowed| {
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Resolve a possibly relative URL against the app origin
    pub fn resolve_url(&self, url: &str) -> Result<Url, url::ParseError> {
        self.app_origin.join(url)
    }

    /// Both historical URL shapes of a thumbnail
    pub fn thumbnail_alternates(&self, language: &LanguageTag, entity_id: u64) -> Vec<Url> {
        let Some(code) = language.code() else {
            return Vec::new();
        };
        self.thumbnail_templates
            .iter()
            .filter_map(|template| {
                let url = template
                    .replace("{lang}", code)
                    .replace("{id}", &entity_id.to_string());
                Url::parse(&url).ok()
            })
            .collect()
    }

    /// Whether a shell response for this URL may be stored
    pub fn is_storable_shell(&self, url: &Url) -> bool {
        let path = url.path();
        !self.no_store_markers.iter().any(|m| path.contains(m.as_str()))
    }
}
