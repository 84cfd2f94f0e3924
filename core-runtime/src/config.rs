//! # Core Configuration Module
//!
//! Configuration for the Lectern playback core.
//!
//! ## Overview
//!
//! [`MediaEndpoints`] describes where media lives: one public base URL plus a
//! path segment per media category. It is plain data and deserializes from
//! the host's configuration file with per-field defaults.
//!
//! [`CoreConfig`] bundles the endpoints with the host bridges the core needs.
//! It is built through [`CoreConfigBuilder`], which fails fast with an
//! actionable [`Error::CapabilityMissing`] when a required bridge is absent.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - media fetches (desktop default: reqwest, behind the
//!   `desktop-shims` feature)
//!
//! ## Optional Dependencies
//!
//! - `PlaybackAdapter` - native audio output; when absent the service layer
//!   falls back to the HTTP decoding adapter
//! - `AudioSink` - PCM destination for the HTTP decoding adapter; decoded
//!   audio is discarded when absent
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, MediaEndpoints};
//!
//! let config = CoreConfig::builder()
//!     .media(MediaEndpoints::new("https://cdn.example.com"))
//!     .http_client(Arc::new(MyHttpClient))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioSink, HttpClient, PlaybackAdapter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

fn default_audio_segment() -> String {
    "audio-bucket".to_string()
}

fn default_image_segment() -> String {
    "image-bucket".to_string()
}

fn default_thumbnail_segment() -> String {
    "thumbnail-bucket".to_string()
}

fn default_document_segment() -> String {
    "document-bucket".to_string()
}

fn default_placeholder_file() -> String {
    "placeholder.png".to_string()
}

/// Public storage layout for remotely hosted media.
///
/// ```
/// use core_runtime::config::MediaEndpoints;
///
/// let endpoints: MediaEndpoints =
///     serde_json::from_str(r#"{ "baseUrl": "https://cdn.example.com" }"#).unwrap();
/// assert_eq!(endpoints.audio_segment, "audio-bucket");
/// assert!(endpoints.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEndpoints {
    /// Absolute `http`/`https` URL every bare reference is resolved against.
    pub base_url: String,

    #[serde(default = "default_audio_segment")]
    pub audio_segment: String,

    #[serde(default = "default_image_segment")]
    pub image_segment: String,

    #[serde(default = "default_thumbnail_segment")]
    pub thumbnail_segment: String,

    #[serde(default = "default_document_segment")]
    pub document_segment: String,

    /// File name of the fallback artwork inside the image and thumbnail buckets.
    #[serde(default = "default_placeholder_file")]
    pub placeholder_file: String,

    /// Absolute URL overriding the image placeholder.
    #[serde(default)]
    pub image_placeholder: Option<String>,

    /// Absolute URL overriding the thumbnail placeholder.
    #[serde(default)]
    pub thumbnail_placeholder: Option<String>,
}

impl MediaEndpoints {
    /// Endpoints rooted at `base_url` with the default bucket layout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            audio_segment: default_audio_segment(),
            image_segment: default_image_segment(),
            thumbnail_segment: default_thumbnail_segment(),
            document_segment: default_document_segment(),
            placeholder_file: default_placeholder_file(),
            image_placeholder: None,
            thumbnail_placeholder: None,
        }
    }

    pub fn with_audio_segment(mut self, segment: impl Into<String>) -> Self {
        self.audio_segment = segment.into();
        self
    }

    pub fn with_image_placeholder(mut self, url: impl Into<String>) -> Self {
        self.image_placeholder = Some(url.into());
        self
    }

    pub fn with_thumbnail_placeholder(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_placeholder = Some(url.into());
        self
    }

    /// Parsed base URL. Fails when `base_url` is not absolute http(s).
    pub fn base(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("Invalid media base URL '{}': {}", self.base_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Media base URL must be an absolute http(s) URL, got '{}'",
                self.base_url
            )));
        }

        Ok(url)
    }

    pub fn validate(&self) -> Result<()> {
        self.base()?;

        for (name, segment) in [
            ("audio", &self.audio_segment),
            ("image", &self.image_segment),
            ("thumbnail", &self.thumbnail_segment),
            ("document", &self.document_segment),
        ] {
            if segment.trim_matches('/').is_empty() {
                return Err(Error::Config(format!(
                    "Path segment for {} media cannot be empty",
                    name
                )));
            }
        }

        if self.placeholder_file.trim().is_empty() {
            return Err(Error::Config("Placeholder file name cannot be empty".to_string()));
        }

        for placeholder in [&self.image_placeholder, &self.thumbnail_placeholder]
            .into_iter()
            .flatten()
        {
            Url::parse(placeholder).map_err(|e| {
                Error::Config(format!("Invalid placeholder URL '{}': {}", placeholder, e))
            })?;
        }

        Ok(())
    }
}

/// Core configuration for the Lectern playback core.
#[derive(Clone)]
pub struct CoreConfig {
    pub media: MediaEndpoints,

    /// HTTP transport for media fetches.
    pub http_client: Arc<dyn HttpClient>,

    /// Native audio output. `None` selects the HTTP decoding adapter.
    pub playback_adapter: Option<Arc<dyn PlaybackAdapter>>,

    /// Receives decoded PCM from the HTTP decoding adapter. Unused when a
    /// native `playback_adapter` is set.
    pub audio_sink: Option<Arc<dyn AudioSink>>,

    /// Per-subscriber buffer of the event bus.
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media", &self.media)
            .field("http_client", &"HttpClient { ... }")
            .field(
                "playback_adapter",
                &self
                    .playback_adapter
                    .as_ref()
                    .map(|_| "PlaybackAdapter { ... }"),
            )
            .field(
                "audio_sink",
                &self.audio_sink.as_ref().map(|_| "AudioSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.media.validate()?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::capability_missing(
        "HttpClient",
        "HttpClient implementation is required to fetch media. \
         Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
         Mobile: inject the platform networking stack (URLSession/OkHttp).",
    ))
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    media: Option<MediaEndpoints>,
    http_client: Option<Arc<dyn HttpClient>>,
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
    audio_sink: Option<Arc<dyn AudioSink>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the media storage layout (required).
    pub fn media(mut self, media: MediaEndpoints) -> Self {
        self.media = Some(media);
        self
    }

    /// Shorthand for `media(MediaEndpoints::new(base_url))`.
    pub fn media_base_url(self, base_url: impl Into<String>) -> Self {
        self.media(MediaEndpoints::new(base_url))
    }

    /// Sets the HTTP client. Falls back to the desktop default when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    /// Output device for the HTTP decoding adapter.
    pub fn audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    /// Default: 100 events.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Validates required dependencies and settings.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the media endpoints are missing or invalid
    /// - [`Error::CapabilityMissing`] when no `HttpClient` is available
    pub fn build(self) -> Result<CoreConfig> {
        let media = self.media.ok_or_else(|| {
            Error::Config(
                "Media endpoints are required. Use .media() or .media_base_url() to set them."
                    .to_string(),
            )
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            media,
            http_client,
            playback_adapter: self.playback_adapter,
            audio_sink: self.audio_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
