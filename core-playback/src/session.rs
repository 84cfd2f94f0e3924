//! # Playback Session Controller
//!
//! Binds one "now playing" slot to a [`PlaybackEngine`]: resolves the
//! selected reference, loads it, forwards transport gestures, and keeps
//! progress current with a poll task while playing.
//!
//! The poll task is owned through a [`TaskGuard`]. It is started when the
//! engine enters `Playing`, exits on its own as soon as the engine leaves
//! `Playing`, and is cancelled on every selection change, on `close`, and when
//! the controller is dropped. It cannot outlive the controller.
//!
//! ## Usage
//!
//! ```ignore
//! let session = PlaybackSession::new(engine, resolver, Some(bus));
//! session.select(MediaReference::parse(chapter.audio_url.as_deref())).await?;
//! session.play().await;
//!
//! let mut status = session.subscribe();
//! while status.changed().await.is_ok() {
//!     render(&status.borrow());
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use core_async::sync::watch;
use core_async::time::{interval_at, Instant, MissedTickBehavior};
use core_async::{spawn_scoped, TaskGuard};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, SessionEvent};
use core_runtime::logging::redact_url;
use tracing::{debug, info, warn};

use crate::engine::{EngineStatus, LoadOutcome, PlaybackEngine};
use crate::error::{PlaybackError, Result};
use crate::resolver::MediaResolver;
use crate::types::{MediaCategory, MediaReference, PlaybackSnapshot, PlaybackState};

const CLEARED_NOTHING_TO_PLAY: &str = "nothing to play";
const CLEARED_CLOSED: &str = "closed";

/// Result of [`PlaybackSession::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A load was issued for the resolved URL.
    Loaded(LoadOutcome),
    /// The reference was absent; the engine is idle.
    NothingToPlay,
}

/// UI-facing controller for a single playback slot.
pub struct PlaybackSession {
    engine: PlaybackEngine,
    resolver: Arc<MediaResolver>,
    events: Option<EventBus>,
    selection: parking_lot::Mutex<Option<MediaReference>>,
    poller: parking_lot::Mutex<Option<TaskGuard>>,
}

impl PlaybackSession {
    pub fn new(
        engine: PlaybackEngine,
        resolver: Arc<MediaResolver>,
        events: Option<EventBus>,
    ) -> Self {
        Self {
            engine,
            resolver,
            events,
            selection: parking_lot::Mutex::new(None),
            poller: parking_lot::Mutex::new(None),
        }
    }

    /// Make `reference` the current selection and load it.
    ///
    /// Polling stops and the previous resource is released before the new
    /// load starts. An absent reference leaves the engine idle.
    pub async fn select(&self, reference: Option<MediaReference>) -> Result<SelectOutcome> {
        self.stop_polling();
        *self.selection.lock() = reference.clone();

        let resolved = reference.and_then(|reference| {
            self.resolver
                .resolve(MediaCategory::Audio, Some(reference.as_str()))
                .map(|url| (reference, url))
        });

        let Some((reference, url)) = resolved else {
            debug!("Selection has no audio; unloading");
            self.engine.unload().await;
            self.emit(SessionEvent::SelectionCleared {
                reason: CLEARED_NOTHING_TO_PLAY.to_string(),
            });
            return Ok(SelectOutcome::NothingToPlay);
        };

        info!(reference = %reference, url = %redact_url(&url), "Selected audio");
        self.emit(SessionEvent::SelectionChanged {
            reference: reference.to_string(),
            url: Some(url.clone()),
        });

        let outcome = self.engine.load(&url).await?;
        Ok(SelectOutcome::Loaded(outcome))
    }

    /// Reload the last URL after a failure, without re-selecting.
    pub async fn retry(&self) -> Result<SelectOutcome> {
        let Some(url) = self.engine.current_url() else {
            return Ok(SelectOutcome::NothingToPlay);
        };

        self.stop_polling();
        info!(url = %redact_url(&url), "Retrying load");
        let outcome = self.engine.load(&url).await?;
        Ok(SelectOutcome::Loaded(outcome))
    }

    pub async fn play(&self) {
        self.run("play", self.engine.play()).await;
    }

    pub async fn pause(&self) {
        self.run("pause", self.engine.pause()).await;
    }

    pub async fn stop(&self) {
        self.run("stop", self.engine.stop()).await;
    }

    pub async fn restart_from_beginning(&self) {
        self.run("restart", self.engine.restart_from_beginning()).await;
    }

    /// Dismiss the player: stop polling, release the resource, clear the
    /// selection.
    pub async fn close(&self) {
        self.stop_polling();
        self.engine.unload().await;
        *self.selection.lock() = None;
        self.emit(SessionEvent::SelectionCleared {
            reason: CLEARED_CLOSED.to_string(),
        });
    }

    pub fn selection(&self) -> Option<MediaReference> {
        self.selection.lock().clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.engine.snapshot()
    }

    /// Watch state and progress. This is the single source of truth for
    /// whether audio is playing.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.engine.subscribe()
    }

    /// Detailed cause of the last load failure, for diagnostics.
    pub fn last_error(&self) -> Option<String> {
        self.engine.last_error()
    }

    /// Whether the progress poll task is alive.
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .map(|guard| !guard.is_finished())
            .unwrap_or(false)
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    async fn run<F>(&self, operation: &str, action: F)
    where
        F: Future<Output = Result<()>>,
    {
        match action.await {
            Ok(()) => {}
            Err(PlaybackError::InvalidOperation(reason)) => {
                debug!(operation, %reason, "Ignoring transport call");
            }
            Err(err) => {
                warn!(operation, error = %err, "Transport call failed");
            }
        }
        self.sync_poller();
    }

    /// Start the poll task when playing, drop it otherwise.
    fn sync_poller(&self) {
        let mut poller = self.poller.lock();
        if self.engine.state().is_playing() {
            let running = poller.as_ref().is_some_and(|guard| !guard.is_finished());
            if !running {
                *poller = Some(spawn_scoped(poll_progress(
                    self.engine.clone(),
                    self.events.clone(),
                )));
            }
        } else if poller.take().is_some() {
            debug!("Progress polling cancelled");
        }
    }

    fn stop_polling(&self) {
        self.poller.lock().take();
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Session(event));
        }
    }
}

/// Refresh the engine snapshot every poll interval until it stops playing.
async fn poll_progress(engine: PlaybackEngine, events: Option<EventBus>) {
    let period = engine.config().poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status_rx = engine.subscribe();

    debug!(interval_ms = period.as_millis() as u64, "Progress polling started");
    loop {
        if !status_rx.borrow_and_update().state.is_playing() {
            break;
        }

        core_async::select! {
            _ = ticker.tick() => {
                let Some(snapshot) = engine.refresh_status().await else {
                    break;
                };
                if let (Some(events), Some(url)) = (&events, engine.current_url()) {
                    let _ = events.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                        url,
                        position_ms: snapshot.position_ms,
                        duration_ms: snapshot.duration_ms,
                    }));
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("Progress polling stopped");
}
