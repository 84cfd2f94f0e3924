//! # Playback Engine
//!
//! Owns at most one native playback resource (a [`PlaybackSessionId`] from the
//! host's [`PlaybackAdapter`]) and drives it through the
//! `Idle → Loading → Ready ⇄ Playing/Paused` state machine.
//!
//! ## Sequencing
//!
//! Operations are serialized by an internal async mutex, so no two adapter
//! calls for the same engine are ever in flight together. `load` and `unload`
//! additionally bump a monotonically increasing *load token* before queueing:
//!
//! - a `load` that is still waiting for the lock when a newer token appears
//!   returns [`LoadOutcome::Superseded`] without touching the adapter;
//! - a `load` whose `prepare` is in flight abandons it as soon as a newer
//!   token is issued (the adapter guarantees a dropped `prepare` holds no
//!   resource);
//! - a `prepare` that completes after being superseded has its resource
//!   released immediately.
//!
//! The most recently issued `load` therefore always determines the final
//! state, and the engine never holds two resources at once.
//!
//! ## Failures
//!
//! Expected failures do not cross the engine boundary as errors. A failed
//! load becomes `PlaybackState::Error("Failed to load audio")` and a failed
//! transport call becomes `PlaybackState::Error("Playback failed")`; the
//! detailed cause is logged and kept in [`PlaybackEngine::last_error`].
//! `Err` is reserved for [`PlaybackError::InvalidOperation`].
//!
//! ## Status
//!
//! State and snapshot are published together through a `watch` channel
//! ([`PlaybackEngine::subscribe`]). Native status callbacks are tagged with
//! the load token that created them; callbacks for a released resource are
//! dropped.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bridge_traits::{
    NativeStatus, PlaybackAdapter, PlaybackRequest, PlaybackSessionId, PlaybackStatusListener,
};
use core_async::runtime;
use core_async::sync::{watch, Mutex};
use core_async::time::timeout;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use core_runtime::logging::redact_url;
use tracing::{debug, info, instrument, warn};

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result, LOAD_FAILURE_MESSAGE, PLAYBACK_FAILURE_MESSAGE};
use crate::types::{PlaybackSnapshot, PlaybackState};

/// State and snapshot as observed by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineStatus {
    pub state: PlaybackState,
    pub snapshot: PlaybackSnapshot,
}

/// How a call to [`PlaybackEngine::load`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The resource is open; the engine is `Ready`.
    Ready,
    /// The load failed; the engine is in `Error`.
    Failed,
    /// A newer `load` or `unload` took over; this call changed nothing final.
    Superseded,
}

#[derive(Default)]
struct Slot {
    token: u64,
    session: Option<PlaybackSessionId>,
    url: Option<String>,
    duration: Option<Duration>,
    last_error: Option<String>,
    completed: bool,
}

struct EngineShared {
    adapter: Arc<dyn PlaybackAdapter>,
    config: PlaybackConfig,
    events: Option<EventBus>,
    ops: Mutex<()>,
    token_tx: watch::Sender<u64>,
    slot: parking_lot::Mutex<Slot>,
    status_tx: watch::Sender<EngineStatus>,
}

/// Single-resource playback state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PlaybackEngine {
    shared: Arc<EngineShared>,
}

impl PlaybackEngine {
    pub fn new(
        adapter: Arc<dyn PlaybackAdapter>,
        config: PlaybackConfig,
        events: Option<EventBus>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::Config)?;

        let (token_tx, _) = watch::channel(0);
        let (status_tx, _) = watch::channel(EngineStatus::default());

        Ok(Self {
            shared: Arc::new(EngineShared {
                adapter,
                config,
                events,
                ops: Mutex::new(()),
                token_tx,
                slot: parking_lot::Mutex::new(Slot::default()),
                status_tx,
            }),
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.shared.config
    }

    /// Open `url`, releasing any resource held before.
    ///
    /// Returns `Err` only for an empty URL. Load failures are reported as
    /// [`LoadOutcome::Failed`] with the engine in `Error`.
    #[instrument(skip(self, url), fields(url = %redact_url(url)))]
    pub async fn load(&self, url: &str) -> Result<LoadOutcome> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PlaybackError::invalid("load requires a non-empty URL"));
        }

        let token = self.shared.next_token();
        let _ops = self.shared.ops.lock().await;
        if self.shared.is_stale(token) {
            debug!(token, "Load superseded before it started");
            return Ok(LoadOutcome::Superseded);
        }

        self.shared.release_current().await;
        {
            let mut slot = self.shared.slot.lock();
            *slot = Slot {
                token,
                url: Some(url.to_string()),
                ..Slot::default()
            };
        }
        self.shared
            .publish(PlaybackState::Loading, PlaybackSnapshot::default());
        self.shared.emit(PlaybackEvent::Loading {
            url: url.to_string(),
        });

        let listener: Arc<dyn PlaybackStatusListener> = Arc::new(TokenListener {
            engine: Arc::downgrade(&self.shared),
            token,
        });
        let mut token_rx = self.shared.token_tx.subscribe();
        let prepared = core_async::select! {
            biased;
            _ = superseded(&mut token_rx, token) => None,
            result = self.shared.prepare(PlaybackRequest::new(url), listener) => Some(result),
        };

        let result = match prepared {
            Some(result) => result,
            None => {
                debug!(token, "Load superseded while in flight");
                return Ok(LoadOutcome::Superseded);
            }
        };

        match result {
            Ok(media) => {
                if self.shared.is_stale(token) {
                    debug!(token, "Discarding stale load result");
                    self.shared.unload_quietly(media.session).await;
                    return Ok(LoadOutcome::Superseded);
                }

                {
                    let mut slot = self.shared.slot.lock();
                    slot.session = Some(media.session);
                    slot.duration = media.duration;
                }
                let snapshot = PlaybackSnapshot::at_start(media.duration);
                self.shared.publish(PlaybackState::Ready, snapshot);
                info!(session = %media.session, duration_ms = ?snapshot.duration_ms, "Audio ready");
                self.shared.emit(PlaybackEvent::Ready {
                    url: url.to_string(),
                    duration_ms: snapshot.duration_ms,
                });
                Ok(LoadOutcome::Ready)
            }
            Err(err) => {
                if self.shared.is_stale(token) {
                    return Ok(LoadOutcome::Superseded);
                }

                warn!(error = %err, "Failed to load audio");
                self.shared.slot.lock().last_error = Some(err.to_string());
                self.shared.publish(
                    PlaybackState::Error(LOAD_FAILURE_MESSAGE.to_string()),
                    PlaybackSnapshot::default(),
                );
                self.shared.emit(PlaybackEvent::Error {
                    url: Some(url.to_string()),
                    message: LOAD_FAILURE_MESSAGE.to_string(),
                    recoverable: err.is_recoverable(),
                });
                Ok(LoadOutcome::Failed)
            }
        }
    }

    /// Start or resume output. A track sitting at its end restarts from 0.
    pub async fn play(&self) -> Result<()> {
        let _ops = self.shared.ops.lock().await;
        self.shared.play_locked().await
    }

    /// Pause output. Does nothing unless playing.
    pub async fn pause(&self) -> Result<()> {
        let _ops = self.shared.ops.lock().await;
        let (session, url) = self.shared.require_loaded("pause")?;
        if !self.state().is_playing() {
            return Ok(());
        }

        let status = match self.shared.pause_output(session).await {
            Ok(status) => status,
            Err(err) => {
                self.shared.fail_playback(&url, err);
                return Ok(());
            }
        };

        let snapshot = self.shared.snapshot_from(&status, false);
        self.shared.publish(PlaybackState::Paused, snapshot);
        self.shared.emit(PlaybackEvent::Paused {
            url,
            position_ms: snapshot.position_ms,
        });
        Ok(())
    }

    /// Halt output and rewind to 0. The resource stays loaded.
    pub async fn stop(&self) -> Result<()> {
        let _ops = self.shared.ops.lock().await;
        let (session, url) = self.shared.require_loaded("stop")?;

        if let Err(err) = self.shared.adapter.stop(session).await {
            self.shared.fail_playback(&url, err.into());
            return Ok(());
        }

        let duration = {
            let mut slot = self.shared.slot.lock();
            slot.completed = false;
            slot.duration
        };
        self.shared
            .publish(PlaybackState::Ready, PlaybackSnapshot::at_start(duration));
        self.shared.emit(PlaybackEvent::Stopped { url });
        Ok(())
    }

    /// Seek to 0 and make sure output is running.
    pub async fn restart_from_beginning(&self) -> Result<()> {
        let _ops = self.shared.ops.lock().await;
        let (session, url) = self.shared.require_loaded("restart")?;

        if let Err(err) = self.shared.adapter.seek(session, Duration::ZERO).await {
            self.shared.fail_playback(&url, err.into());
            return Ok(());
        }

        let duration = {
            let mut slot = self.shared.slot.lock();
            slot.completed = false;
            slot.duration
        };

        if self.state().is_playing() {
            self.shared.status_tx.send_modify(|status| {
                status.snapshot = PlaybackSnapshot::new(Duration::ZERO, duration, true);
            });
            return Ok(());
        }

        self.shared.play_locked().await
    }

    /// Release the held resource and return to `Idle`.
    ///
    /// Also supersedes any in-flight `load`. Safe to call repeatedly.
    pub async fn unload(&self) {
        self.shared.next_token();
        let _ops = self.shared.ops.lock().await;

        self.shared.release_current().await;
        {
            let mut slot = self.shared.slot.lock();
            let token = slot.token;
            *slot = Slot {
                token,
                ..Slot::default()
            };
        }
        self.shared
            .publish(PlaybackState::Idle, PlaybackSnapshot::default());
    }

    /// Read the native status and fold it into the published snapshot.
    ///
    /// Returns `None` when nothing is loaded.
    pub async fn refresh_status(&self) -> Option<PlaybackSnapshot> {
        let _ops = self.shared.ops.lock().await;
        let (session, url) = self.shared.require_loaded("refresh").ok()?;

        match self.shared.adapter.status(session).await {
            Ok(status) => {
                if self.shared.apply_native_status(session, status) {
                    self.shared.halt_finished(session).await;
                }
                Some(self.snapshot())
            }
            Err(err) => {
                self.shared.fail_playback(&url, err.into());
                Some(self.snapshot())
            }
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.status_tx.borrow().state.clone()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.status_tx.borrow().snapshot
    }

    pub fn status(&self) -> EngineStatus {
        self.shared.status_tx.borrow().clone()
    }

    /// Watch state and snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.shared.status_tx.subscribe()
    }

    /// URL of the current (or last attempted) load.
    pub fn current_url(&self) -> Option<String> {
        self.shared.slot.lock().url.clone()
    }

    /// Detailed cause of the most recent load failure.
    pub fn last_error(&self) -> Option<String> {
        self.shared.slot.lock().last_error.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.slot.lock().session.is_some()
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("status", &self.status())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl EngineShared {
    fn next_token(&self) -> u64 {
        let mut issued = 0;
        self.token_tx.send_modify(|token| {
            *token += 1;
            issued = *token;
        });
        issued
    }

    fn is_stale(&self, token: u64) -> bool {
        *self.token_tx.borrow() != token
    }

    async fn prepare(
        &self,
        request: PlaybackRequest,
        listener: Arc<dyn PlaybackStatusListener>,
    ) -> Result<bridge_traits::PreparedMedia> {
        let prepare = self.adapter.prepare(request, listener);
        match self.config.load_timeout {
            Some(limit) => match timeout(limit, prepare).await {
                Ok(result) => result.map_err(PlaybackError::from),
                Err(_) => Err(PlaybackError::LoadFailure(format!(
                    "timed out after {} ms",
                    limit.as_millis()
                ))),
            },
            None => prepare.await.map_err(PlaybackError::from),
        }
    }

    fn require_loaded(&self, operation: &str) -> Result<(PlaybackSessionId, String)> {
        let slot = self.slot.lock();
        match (slot.session, slot.url.clone()) {
            (Some(session), Some(url)) => Ok((session, url)),
            _ => Err(PlaybackError::invalid(format!(
                "cannot {} without loaded audio",
                operation
            ))),
        }
    }

    async fn play_locked(&self) -> Result<()> {
        let (session, url) = self.require_loaded("play")?;
        if self.status_tx.borrow().state.is_playing() {
            return Ok(());
        }

        let status = match self.start_output(session).await {
            Ok(status) => status,
            Err(err) => {
                self.fail_playback(&url, err);
                return Ok(());
            }
        };

        self.slot.lock().completed = false;
        let snapshot = self.snapshot_from(&status, true);
        self.publish(PlaybackState::Playing, snapshot);
        self.emit(PlaybackEvent::Started {
            url,
            position_ms: snapshot.position_ms,
        });
        Ok(())
    }

    async fn start_output(&self, session: PlaybackSessionId) -> Result<NativeStatus> {
        let status = self.adapter.status(session).await?;
        let (duration, completed) = {
            let slot = self.slot.lock();
            (status.duration.or(slot.duration), slot.completed)
        };
        if completed || self.config.is_at_end(status.position, duration) {
            debug!(%session, "Track finished; replaying from the start");
            self.adapter.seek(session, Duration::ZERO).await?;
        }

        self.adapter.play(session).await?;
        Ok(self.adapter.status(session).await?)
    }

    async fn pause_output(&self, session: PlaybackSessionId) -> Result<NativeStatus> {
        self.adapter.pause(session).await?;
        Ok(self.adapter.status(session).await?)
    }

    fn snapshot_from(&self, status: &NativeStatus, is_playing: bool) -> PlaybackSnapshot {
        let mut slot = self.slot.lock();
        if status.duration.is_some() {
            slot.duration = status.duration;
        }
        PlaybackSnapshot::new(status.position, slot.duration, is_playing)
    }

    /// Fold a native status report into the published state.
    ///
    /// While playing, a finish report (or the position reaching the
    /// duration) ends the track: the state becomes `Paused` with the
    /// playhead pinned to the duration, and `Completed` is emitted once.
    /// Output stopping anywhere else is an external pause.
    ///
    /// Returns `true` when the track ended but the device still reports
    /// output, so the caller must halt it.
    fn apply_native_status(&self, session: PlaybackSessionId, status: NativeStatus) -> bool {
        let mut completed_url = None;
        let mut halt = false;
        {
            let mut slot = self.slot.lock();
            if slot.session != Some(session) {
                return false;
            }
            if status.duration.is_some() {
                slot.duration = status.duration;
            }
            let duration = slot.duration;

            let playing = self.status_tx.borrow().state.is_playing();
            let at_end = status.did_just_finish || self.config.is_at_end(status.position, duration);

            if playing && at_end {
                let position = duration.unwrap_or(status.position);
                self.publish(
                    PlaybackState::Paused,
                    PlaybackSnapshot::new(position, duration, false),
                );
                halt = status.is_playing;
                if !slot.completed {
                    slot.completed = true;
                    completed_url = slot.url.clone();
                }
            } else if playing && !status.is_playing {
                self.publish(
                    PlaybackState::Paused,
                    PlaybackSnapshot::new(status.position, duration, false),
                );
            } else {
                // A finished track keeps its playhead at the end until the
                // next transport call.
                let position = if slot.completed {
                    duration.unwrap_or(status.position)
                } else {
                    status.position
                };
                self.status_tx.send_modify(|current| {
                    let is_playing = status.is_playing && current.state.is_playing();
                    current.snapshot = PlaybackSnapshot::new(position, duration, is_playing);
                });
            }
        }

        if let Some(url) = completed_url {
            info!("Track completed");
            self.emit(PlaybackEvent::Completed { url });
        }
        halt
    }

    /// Pause a device that kept rendering past the end of track.
    async fn halt_finished(&self, session: PlaybackSessionId) {
        debug!(%session, "Halting output after end of track");
        if let Err(err) = self.adapter.pause(session).await {
            warn!(%session, error = %err, "Failed to halt output after end of track");
        }
    }

    fn fail_playback(&self, url: &str, err: PlaybackError) {
        warn!(error = %err, url = %redact_url(url), "Playback failed");
        self.slot.lock().last_error = Some(err.to_string());
        let snapshot = self.status_tx.borrow().snapshot;
        self.publish(
            PlaybackState::Error(PLAYBACK_FAILURE_MESSAGE.to_string()),
            PlaybackSnapshot {
                is_playing: false,
                ..snapshot
            },
        );
        self.emit(PlaybackEvent::Error {
            url: Some(url.to_string()),
            message: PLAYBACK_FAILURE_MESSAGE.to_string(),
            recoverable: true,
        });
    }

    async fn release_current(&self) {
        let (session, url) = {
            let mut slot = self.slot.lock();
            (slot.session.take(), slot.url.clone())
        };

        if let Some(session) = session {
            self.unload_quietly(session).await;
            if let Some(url) = url {
                self.emit(PlaybackEvent::Unloaded { url });
            }
        }
    }

    async fn unload_quietly(&self, session: PlaybackSessionId) {
        if let Err(err) = self.adapter.unload(session).await {
            warn!(%session, error = %err, "Failed to release playback resource");
        }
    }

    fn publish(&self, state: PlaybackState, snapshot: PlaybackSnapshot) {
        self.status_tx.send_modify(|status| {
            status.state = state;
            status.snapshot = snapshot;
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            // No subscribers is fine.
            let _ = events.emit(CoreEvent::Playback(event));
        }
    }
}

impl Drop for EngineShared {
    fn drop(&mut self) {
        let Some(session) = self.slot.get_mut().session.take() else {
            return;
        };

        let adapter = Arc::clone(&self.adapter);
        match runtime::try_current() {
            Some(handle) => {
                handle.spawn(async move {
                    if let Err(err) = adapter.unload(session).await {
                        warn!(%session, error = %err, "Failed to release playback resource on drop");
                    }
                });
            }
            None => {
                warn!(%session, "Engine dropped outside a runtime; playback resource not released");
            }
        }
    }
}

/// Resolves once a token other than `token` has been issued.
async fn superseded(token_rx: &mut watch::Receiver<u64>, token: u64) {
    // The sender lives as long as the engine, so an error cannot occur here.
    let _ = token_rx.wait_for(|current| *current != token).await;
}

/// Native status listener bound to one load token.
struct TokenListener {
    engine: Weak<EngineShared>,
    token: u64,
}

impl PlaybackStatusListener for TokenListener {
    fn on_status(&self, session: PlaybackSessionId, status: NativeStatus) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        if engine.slot.lock().token != self.token {
            return;
        }
        if !engine.apply_native_status(session, status) {
            return;
        }

        // Callbacks cannot await; halt on the runtime under the ops lock.
        let Some(handle) = runtime::try_current() else {
            warn!(%session, "Track ended outside a runtime; output not halted");
            return;
        };
        handle.spawn(async move {
            let _ops = engine.ops.lock().await;
            if engine.slot.lock().session == Some(session) {
                engine.halt_finished(session).await;
            }
        });
    }
}
