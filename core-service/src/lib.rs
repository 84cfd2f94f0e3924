//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport,
//! native playback, catalog source) into the playback core. Desktop apps
//! typically enable the `desktop-shims` feature, which supplies a reqwest
//! HTTP client when none is injected. Hosts without a native media engine
//! get the built-in HTTP playback adapter.
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .media_base_url("https://cdn.example.com")
//!     .build()?;
//! let service = CoreService::new(config, Arc::new(catalog))?;
//! CoreService::install_global(service.clone())?;
//!
//! let session = service.new_session()?;
//! service.select_chapter_audio(&session, "book-1", "chapter-2").await?;
//! session.play().await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{HttpClient, PlaybackAdapter};
use core_library::{Book, CatalogSource};
use core_playback::{
    HttpPlaybackAdapter, MediaCategory, MediaReference, MediaResolver, PlaybackConfig,
    PlaybackEngine, PlaybackSession, SelectOutcome,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument};

static GLOBAL: OnceCell<CoreService> = OnceCell::new();

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub playback_adapter: Arc<dyn PlaybackAdapter>,
    pub catalog: Arc<dyn CatalogSource>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        playback_adapter: Arc<dyn PlaybackAdapter>,
        catalog: Arc<dyn CatalogSource>,
    ) -> Self {
        Self {
            http_client,
            playback_adapter,
            catalog,
        }
    }

    /// Take the bridges from `config`, falling back to the HTTP playback
    /// adapter when no native one was injected.
    pub fn from_config(config: &CoreConfig, catalog: Arc<dyn CatalogSource>) -> Self {
        let playback_adapter = match &config.playback_adapter {
            Some(adapter) => Arc::clone(adapter),
            None => {
                debug!("No native playback adapter; using HttpPlaybackAdapter");
                let adapter = HttpPlaybackAdapter::new(Arc::clone(&config.http_client));
                match &config.audio_sink {
                    Some(sink) => Arc::new(adapter.with_sink(Arc::clone(sink))),
                    None => Arc::new(adapter),
                }
            }
        };

        Self::new(Arc::clone(&config.http_client), playback_adapter, catalog)
    }
}

struct ServiceInner {
    deps: CoreDependencies,
    resolver: Arc<MediaResolver>,
    events: EventBus,
    playback: PlaybackConfig,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Create a service with default playback tuning.
    pub fn new(config: CoreConfig, catalog: Arc<dyn CatalogSource>) -> Result<Self> {
        Self::with_playback_config(config, catalog, PlaybackConfig::default())
    }

    pub fn with_playback_config(
        config: CoreConfig,
        catalog: Arc<dyn CatalogSource>,
        playback: PlaybackConfig,
    ) -> Result<Self> {
        config.validate()?;
        playback
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let resolver = Arc::new(MediaResolver::new(config.media.clone())?);
        let events = EventBus::new(config.event_buffer_size);
        let deps = CoreDependencies::from_config(&config, catalog);

        info!(base_url = %config.media.base_url, "Core service created");
        Ok(Self {
            inner: Arc::new(ServiceInner {
                deps,
                resolver,
                events,
                playback,
            }),
        })
    }

    /// Make `service` the process-wide instance. Only the first call wins.
    pub fn install_global(service: CoreService) -> Result<()> {
        GLOBAL
            .set(service)
            .map_err(|_| CoreError::AlreadyInitialized)
    }

    /// The process-wide instance installed by [`install_global`](Self::install_global).
    pub fn global() -> Result<CoreService> {
        GLOBAL.get().cloned().ok_or(CoreError::NotInitialized)
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> &CoreDependencies {
        &self.inner.deps
    }

    pub fn catalog(&self) -> Arc<dyn CatalogSource> {
        Arc::clone(&self.inner.deps.catalog)
    }

    pub fn resolver(&self) -> &MediaResolver {
        &self.inner.resolver
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    /// A fresh playback slot with its own engine.
    pub fn new_session(&self) -> Result<PlaybackSession> {
        let engine = PlaybackEngine::new(
            Arc::clone(&self.inner.deps.playback_adapter),
            self.inner.playback.clone(),
            Some(self.inner.events.clone()),
        )?;

        Ok(PlaybackSession::new(
            engine,
            Arc::clone(&self.inner.resolver),
            Some(self.inner.events.clone()),
        ))
    }

    /// Select a book's own narration.
    #[instrument(skip(self, session))]
    pub async fn select_book_audio(
        &self,
        session: &PlaybackSession,
        book_id: &str,
    ) -> Result<SelectOutcome> {
        let book = self.inner.deps.catalog.require_book(book_id).await?;
        let reference = MediaReference::parse(book.audio_url.as_deref());
        Ok(session.select(reference).await?)
    }

    /// Select one chapter's narration.
    #[instrument(skip(self, session))]
    pub async fn select_chapter_audio(
        &self,
        session: &PlaybackSession,
        book_id: &str,
        chapter_id: &str,
    ) -> Result<SelectOutcome> {
        let chapter = self.inner.deps.catalog.chapter(book_id, chapter_id).await?;
        let reference = MediaReference::parse(chapter.audio_url.as_deref());
        Ok(session.select(reference).await?)
    }

    /// Thumbnail URL for list views; a placeholder when the book has none.
    pub fn artwork_url(&self, book: &Book) -> Option<String> {
        self.inner
            .resolver
            .resolve(MediaCategory::Thumbnail, book.thumbnail_url.as_deref())
    }

    /// Full-size cover for detail views.
    pub fn cover_url(&self, book: &Book) -> Option<String> {
        self.inner
            .resolver
            .resolve(MediaCategory::Image, book.image_url.as_deref())
    }
}
