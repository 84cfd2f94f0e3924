//! HTTP-backed [`PlaybackAdapter`].
//!
//! `prepare` streams the resource into a [`StreamBuffer`] and opens a
//! [`PcmDecoder`] as soon as the first bytes arrive; the download keeps
//! running in the background. While playing, an output task decodes ahead
//! into a ring buffer and hands PCM to the configured [`AudioSink`] in step
//! with the session's [`PlaybackClock`], which is also the status timeline
//! the engine observes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioFormat, AudioSink, BridgeError, ByteStream, HttpClient, HttpRequest, NativeStatus,
    PlaybackAdapter, PlaybackRequest, PlaybackSessionId, PlaybackStatusListener, PreparedMedia,
    RetryPolicy,
};
use core_async::task::spawn_blocking;
use core_async::time::{sleep, timeout};
use core_async::{spawn_scoped, TaskGuard};
use core_runtime::logging::redact_url;
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::clock::PlaybackClock;
use super::output::{frames_at, position_of, DiscardSink, Pipeline, LOOKAHEAD};
use crate::decoder::{PcmDecoder, StreamBuffer};

/// Longest gap between body chunks before the download is abandoned.
const STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Pace of PCM delivery while playing.
const RENDER_INTERVAL: Duration = Duration::from_millis(50);

type SessionMap = Mutex<HashMap<PlaybackSessionId, SessionEntry>>;

struct SessionEntry {
    clock: PlaybackClock,
    listener: Arc<dyn PlaybackStatusListener>,
    pipeline: Arc<Pipeline>,
    /// Held so the download runs exactly as long as the session.
    _download: TaskGuard,
    output: Option<TaskGuard>,
    end_of_track: Option<TaskGuard>,
}

impl SessionEntry {
    fn status(&self, did_just_finish: bool) -> NativeStatus {
        NativeStatus {
            position: self.clock.position(),
            duration: self.clock.duration(),
            is_playing: self.clock.is_running() && !self.clock.is_at_end(),
            did_just_finish,
        }
    }

    /// Move the playhead and restart output from there.
    fn reposition(&mut self) {
        let frame = frames_at(self.clock.position(), self.pipeline.format().sample_rate);
        self.pipeline.reposition(frame);
    }
}

/// Playback adapter for hosts without a native media engine.
pub struct HttpPlaybackAdapter {
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    sink: Arc<dyn AudioSink>,
    sessions: Arc<SessionMap>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl HttpPlaybackAdapter {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            retry: RetryPolicy::default(),
            sink: Arc::new(DiscardSink),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Retry policy for establishing the media response.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Output device for decoded audio. Defaults to [`DiscardSink`].
    pub fn with_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Resources currently held.
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn acquired_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Stream format of an open session.
    pub fn format(&self, session: PlaybackSessionId) -> Option<AudioFormat> {
        self.sessions
            .lock()
            .get(&session)
            .map(|entry| entry.pipeline.format().clone())
    }

    /// Apply `change` to a session and notify its listener afterwards.
    fn update<F>(&self, session: PlaybackSessionId, change: F) -> BridgeResult<()>
    where
        F: FnOnce(&mut SessionEntry),
    {
        let (listener, status) = {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .get_mut(&session)
                .ok_or_else(|| BridgeError::UnknownSession(session.to_string()))?;

            let was_running = entry.clock.is_running();
            change(entry);

            if entry.clock.is_running() {
                let output_idle = entry.output.as_ref().map_or(true, TaskGuard::is_finished);
                if !was_running || output_idle {
                    entry.output = Some(render_output(
                        &self.sessions,
                        session,
                        Arc::clone(&entry.pipeline),
                        Arc::clone(&self.sink),
                    ));
                }
                entry.end_of_track = entry
                    .clock
                    .remaining()
                    .map(|remaining| watch_end_of_track(&self.sessions, session, remaining));
            } else {
                entry.end_of_track = None;
            }
            (Arc::clone(&entry.listener), entry.status(false))
        };

        listener.on_status(session, status);
        Ok(())
    }
}

/// Flip the session to "finished" once `remaining` has elapsed.
fn watch_end_of_track(
    sessions: &Arc<SessionMap>,
    session: PlaybackSessionId,
    remaining: Duration,
) -> TaskGuard {
    let sessions: Weak<SessionMap> = Arc::downgrade(sessions);
    spawn_scoped(async move {
        sleep(remaining).await;

        let Some(sessions) = sessions.upgrade() else {
            return;
        };
        let notify = {
            let mut sessions = sessions.lock();
            match sessions.get_mut(&session) {
                Some(entry) if entry.clock.is_running() && entry.clock.is_at_end() => {
                    entry.clock.pause();
                    Some((Arc::clone(&entry.listener), entry.status(true)))
                }
                _ => None,
            }
        };

        if let Some((listener, status)) = notify {
            debug!(%session, "End of track");
            listener.on_status(session, status);
        }
    })
}

/// Feed `sink` with decoded audio up to the playhead.
///
/// Runs while the clock runs, then delivers whatever is still due up to the
/// final playhead and exits. A stream without a declared length finishes
/// when its decoded audio runs out.
fn render_output(
    sessions: &Arc<SessionMap>,
    session: PlaybackSessionId,
    pipeline: Arc<Pipeline>,
    sink: Arc<dyn AudioSink>,
) -> TaskGuard {
    let sessions: Weak<SessionMap> = Arc::downgrade(sessions);
    spawn_scoped(async move {
        let sample_rate = pipeline.format().sample_rate;
        let lookahead = frames_at(LOOKAHEAD, sample_rate);
        let mut starved = false;

        loop {
            let Some(Playhead {
                position,
                running,
                duration,
            }) = playhead(&sessions, session)
            else {
                return;
            };

            let due = frames_at(position, sample_rate).saturating_sub(pipeline.rendered());
            let ahead = if running { lookahead } else { 0 };
            let filling = Arc::clone(&pipeline);
            match spawn_blocking(move || filling.fill(due + ahead)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(%session, error = %err, "Decoding stopped early"),
                Err(err) => {
                    warn!(%session, error = %err, "Decode task failed");
                    return;
                }
            }

            let delivered = pipeline.deliver(session, sink.as_ref(), due);
            let drained = pipeline.is_drained();
            if delivered < due && !drained {
                if !starved {
                    warn!(%session, missing = due - delivered, "Output underrun");
                }
                starved = true;
            } else {
                starved = false;
            }

            if running && drained && duration.is_none() {
                finish_unbounded(&sessions, session, position_of(pipeline.rendered(), sample_rate));
                continue;
            }

            if !running {
                if delivered >= due || drained {
                    debug!(%session, rendered = pipeline.rendered(), "Output idle");
                    return;
                }
                continue;
            }

            sleep(RENDER_INTERVAL).await;
        }
    })
}

struct Playhead {
    position: Duration,
    running: bool,
    duration: Option<Duration>,
}

fn playhead(sessions: &Weak<SessionMap>, session: PlaybackSessionId) -> Option<Playhead> {
    let sessions = sessions.upgrade()?;
    let sessions = sessions.lock();
    sessions.get(&session).map(|entry| Playhead {
        position: entry.clock.position(),
        running: entry.clock.is_running(),
        duration: entry.clock.duration(),
    })
}

/// End a stream whose length was unknown at `end`.
fn finish_unbounded(sessions: &Weak<SessionMap>, session: PlaybackSessionId, end: Duration) {
    let Some(sessions) = sessions.upgrade() else {
        return;
    };
    let notify = {
        let mut sessions = sessions.lock();
        match sessions.get_mut(&session) {
            Some(entry) if entry.clock.is_running() && entry.clock.duration().is_none() => {
                entry.clock.set_duration(Some(end));
                entry.clock.pause();
                entry.end_of_track = None;
                Some((Arc::clone(&entry.listener), entry.status(true)))
            }
            _ => None,
        }
    };

    if let Some((listener, status)) = notify {
        debug!(%session, end_ms = end.as_millis() as u64, "End of stream");
        listener.on_status(session, status);
    }
}

/// Fails the buffer if the download stops without finishing it.
struct DownloadGuard(StreamBuffer);

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        self.0.fail("download cancelled");
    }
}

/// Copy `body` into `buffer` until it ends, fails or stalls.
async fn pump_body(mut body: ByteStream, buffer: StreamBuffer) {
    let guard = DownloadGuard(buffer);
    let buffer = &guard.0;
    loop {
        match timeout(STALL_TIMEOUT, body.next()).await {
            Ok(Some(Ok(chunk))) => buffer.append(&chunk),
            Ok(Some(Err(err))) => {
                warn!(error = %err, received = buffer.len(), "Media download failed");
                buffer.fail(err.to_string());
                return;
            }
            Ok(None) => {
                debug!(bytes = buffer.len(), "Media download complete");
                buffer.finish();
                return;
            }
            Err(_) => {
                warn!(received = buffer.len(), "Media download stalled");
                buffer.fail("download stalled");
                return;
            }
        }
    }
}

#[async_trait]
impl PlaybackAdapter for HttpPlaybackAdapter {
    #[instrument(skip(self, request, listener), fields(url = %redact_url(&request.url)))]
    async fn prepare(
        &self,
        request: PlaybackRequest,
        listener: Arc<dyn PlaybackStatusListener>,
    ) -> BridgeResult<PreparedMedia> {
        let response = self
            .http
            .execute_streaming(
                HttpRequest::get(request.url.as_str()).accept_audio(),
                self.retry.clone(),
            )
            .await?;

        if !response.is_success() {
            return Err(BridgeError::OperationFailed(format!(
                "HTTP {} while fetching media",
                response.status
            )));
        }
        debug!(length = ?response.content_length(), "Media response received");

        let content_type = response.content_type();
        let buffer = StreamBuffer::new();
        let download = spawn_scoped(pump_body(response.body, buffer.clone()));

        let source = buffer.clone();
        let url = request.url.clone();
        let opened = spawn_blocking(move || PcmDecoder::open(source, &url, content_type.as_deref()))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Decoder task failed: {}", e)))?;
        let decoder = match opened {
            Ok(decoder) => decoder,
            Err(err) => {
                return Err(match buffer.failure() {
                    Some(reason) => {
                        BridgeError::OperationFailed(format!("Media download failed: {}", reason))
                    }
                    None => err.into(),
                });
            }
        };

        let duration = decoder.duration();
        let mut entry = SessionEntry {
            clock: PlaybackClock::new(duration),
            listener,
            pipeline: Arc::new(Pipeline::new(decoder)),
            _download: download,
            output: None,
            end_of_track: None,
        };
        if !request.start_position.is_zero() {
            entry.clock.seek(request.start_position);
            entry.reposition();
        }

        // Nothing is held until this point, so dropping the future earlier
        // leaks nothing.
        let session = PlaybackSessionId::new();
        self.sessions.lock().insert(session, entry);
        self.acquired.fetch_add(1, Ordering::SeqCst);

        info!(%session, ?duration, "Media prepared");
        Ok(PreparedMedia { session, duration })
    }

    async fn play(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.update(session, |entry| entry.clock.start())
    }

    async fn pause(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.update(session, |entry| entry.clock.pause())
    }

    async fn stop(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        self.update(session, |entry| {
            entry.clock.reset();
            entry.reposition();
        })
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> BridgeResult<()> {
        self.update(session, |entry| {
            entry.clock.seek(position);
            entry.reposition();
        })
    }

    async fn status(&self, session: PlaybackSessionId) -> BridgeResult<NativeStatus> {
        self.sessions
            .lock()
            .get(&session)
            .map(|entry| entry.status(false))
            .ok_or_else(|| BridgeError::UnknownSession(session.to_string()))
    }

    async fn unload(&self, session: PlaybackSessionId) -> BridgeResult<()> {
        let removed = self.sessions.lock().remove(&session);
        if let Some(entry) = removed {
            drop(entry);
            self.sink.close(session);
            self.released.fetch_add(1, Ordering::SeqCst);
            debug!(%session, "Media released");
        }
        Ok(())
    }
}
