//! Shared test doubles for the playback integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, NativeStatus, PlaybackAdapter, PlaybackRequest, PlaybackSessionId,
    PlaybackStatusListener, PreparedMedia,
};
use core_async::time::sleep;
use core_playback::backend::PlaybackClock;
use core_runtime::config::MediaEndpoints;
use core_runtime::events::{CoreEvent, PlaybackEvent};
use core_async::sync::broadcast::Receiver;
use parking_lot::Mutex;

pub const BASE_URL: &str = "https://cdn.example.com";

pub fn audio_url(file: &str) -> String {
    format!("{}/audio-bucket/{}", BASE_URL, file)
}

pub fn endpoints() -> MediaEndpoints {
    MediaEndpoints::new(BASE_URL)
}

/// How the fake adapter serves one URL.
#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub duration: Option<Duration>,
    /// Simulated fetch and open time.
    pub delay: Duration,
    pub fail_load: bool,
    pub fail_play: bool,
}

impl TrackSpec {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            delay: Duration::from_millis(100),
            fail_load: false,
            fail_play: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_play(mut self) -> Self {
        self.fail_play = true;
        self
    }
}

struct FakeSession {
    url: String,
    spec: TrackSpec,
    clock: PlaybackClock,
    listener: Arc<dyn PlaybackStatusListener>,
}

impl FakeSession {
    fn status(&self, did_just_finish: bool) -> NativeStatus {
        NativeStatus {
            position: self.clock.position(),
            duration: self.clock.duration(),
            is_playing: self.clock.is_running() && !self.clock.is_at_end(),
            did_just_finish,
        }
    }
}

/// In-memory adapter with acquire/release accounting. Unknown URLs fail to
/// load.
#[derive(Default)]
pub struct CountingAdapter {
    tracks: Mutex<HashMap<String, TrackSpec>>,
    sessions: Mutex<HashMap<PlaybackSessionId, FakeSession>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    max_open: AtomicUsize,
}

impl CountingAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_track(self: Arc<Self>, url: impl Into<String>, spec: TrackSpec) -> Arc<Self> {
        self.set_track(url, spec);
        self
    }

    pub fn set_track(&self, url: impl Into<String>, spec: TrackSpec) {
        self.tracks.lock().insert(url.into(), spec);
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Highest number of resources ever held at once.
    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    /// Number of open resources whose output is running.
    pub fn rendering(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|session| session.clock.is_running())
            .count()
    }

    pub fn open_urls(&self) -> Vec<String> {
        self.sessions
            .lock()
            .values()
            .map(|session| session.url.clone())
            .collect()
    }

    /// Simulate the native end-of-track callback for every open session.
    pub fn finish_all(&self) {
        let notifications: Vec<_> = {
            let mut sessions = self.sessions.lock();
            sessions
                .iter_mut()
                .map(|(id, session)| {
                    if let Some(duration) = session.clock.duration() {
                        session.clock.seek(duration);
                    }
                    session.clock.pause();
                    (*id, Arc::clone(&session.listener), session.status(true))
                })
                .collect()
        };

        for (id, listener, status) in notifications {
            listener.on_status(id, status);
        }
    }

    fn with_session<T>(
        &self,
        session: PlaybackSessionId,
        f: impl FnOnce(&mut FakeSession) -> BridgeResult<T>,
    ) -> BridgeResult<T> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(&session)
            .ok_or_else(|| BridgeError::UnknownSession(session.to_string()))?;
        f(entry)
    }

    fn notify(&self, session: PlaybackSessionId) {
        let pending = self
            .sessions
            .lock()
            .get(&session)
            .map(|entry| (Arc::clone(&entry.listener), entry.status(false)));
        if let Some((listener, status)) = pending {
            listener.on_status(session, status);
        }
    }
}

#[async_trait]
impl PlaybackAdapter for CountingAdapter {
    async fn prepare(
        &self,
        request: PlaybackRequest,
        listener: Arc<dyn PlaybackStatusListener>,
    ) -> BridgeResult<PreparedMedia> {
        let spec = self.tracks.lock().get(&request.url).cloned();
        let Some(spec) = spec else {
            sleep(Duration::from_millis(10)).await;
            return Err(BridgeError::OperationFailed(format!(
                "HTTP 404 for {}",
                request.url
            )));
        };

        sleep(spec.delay).await;
        if spec.fail_load {
            return Err(BridgeError::OperationFailed("connection reset".to_string()));
        }

        let session = PlaybackSessionId::new();
        let duration = spec.duration;
        let open = {
            let mut sessions = self.sessions.lock();
            sessions.insert(
                session,
                FakeSession {
                    url: request.url.clone(),
                    spec,
                    clock: PlaybackClock::new(duration),
                    listener,
                },
            );
            sessions.len()
        };
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.max_open.fetch_max(open, Ordering::SeqCst);

        Ok(PreparedMedia { session, duration })
    }

    async fn play(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.with_session(session, |entry| {
            if entry.spec.fail_play {
                return Err(BridgeError::OperationFailed("output device lost".to_string()));
            }
            entry.clock.start();
            Ok(())
        })?;
        self.notify(session);
        Ok(())
    }

    async fn pause(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.with_session(session, |entry| {
            entry.clock.pause();
            Ok(())
        })?;
        self.notify(session);
        Ok(())
    }

    async fn stop(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.with_session(session, |entry| {
            entry.clock.reset();
            Ok(())
        })?;
        self.notify(session);
        Ok(())
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> BridgeResult<()> {
        self.with_session(session, |entry| {
            entry.clock.seek(position);
            Ok(())
        })?;
        self.notify(session);
        Ok(())
    }

    async fn status(&self, session: PlaybackSessionId) -> BridgeResult<NativeStatus> {
        self.with_session(session, |entry| Ok(entry.status(false)))
    }

    async fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        if self.sessions.lock().remove(&session).is_some() {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Drain buffered playback events.
pub fn drain_playback_events(rx: &mut Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Playback(event) = event {
            events.push(event);
        }
    }
    events
}
