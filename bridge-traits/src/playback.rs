//! Playback bridge traits and supporting audio types.
//!
//! A [`PlaybackAdapter`] is the host's audio decoder and output device. The
//! core playback engine drives it through an async, session-scoped API and
//! never touches platform audio objects directly.
//!
//! # Resource contract
//!
//! Every successful [`PlaybackAdapter::prepare`] acquires exactly one native
//! resource, identified by the returned [`PlaybackSessionId`]. It is released
//! by [`PlaybackAdapter::unload`] and by nothing else. Implementations must
//! not hold a resource after `prepare` returns an error, and must not leak
//! one if the `prepare` future is dropped before it completes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{error::Result, platform::PlatformSendSync};

/// Supported audio codec identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    Mp3,
    Aac,
    Flac,
    Vorbis,
    Opus,
    Wav,
    Alac,
    Unknown,
    /// Vendor- or platform-specific codec.
    Other(String),
}

/// Stream metadata reported after probing a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub codec: AudioCodec,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: Option<u16>,
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaybackSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request describing the media an adapter should open.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    /// Absolute, fetchable URL.
    pub url: String,
    /// Position to start from once playback begins.
    pub start_position: Duration,
}

impl PlaybackRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start_position: Duration::ZERO,
        }
    }

    pub fn with_start_position(mut self, position: Duration) -> Self {
        self.start_position = position;
        self
    }
}

/// Result of a successful [`PlaybackAdapter::prepare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedMedia {
    pub session: PlaybackSessionId,
    /// Total length, when the container reports one.
    pub duration: Option<Duration>,
}

/// Point-in-time status read from the native output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeStatus {
    pub position: Duration,
    pub duration: Option<Duration>,
    /// Whether the output device is currently rendering audio.
    pub is_playing: bool,
    /// Set on the single status update that reports reaching end of track.
    pub did_just_finish: bool,
}

impl NativeStatus {
    /// `true` when position has reached a known, non-zero duration.
    pub fn is_at_end(&self) -> bool {
        matches!(self.duration, Some(d) if !d.is_zero() && self.position >= d)
    }
}

/// Receives native status changes for one session.
///
/// Invoked synchronously from the adapter, possibly from a host audio
/// thread. Implementations must not block.
pub trait PlaybackStatusListener: PlatformSendSync {
    fn on_status(&self, session: PlaybackSessionId, status: NativeStatus);
}

/// PCM output device for adapters that decode in the core.
///
/// Receives interleaved `f32` samples in playback order, paced by the
/// adapter's playhead. Called from runtime worker threads; implementations
/// should hand samples to their device queue and return without blocking.
pub trait AudioSink: PlatformSendSync {
    fn write(&self, session: PlaybackSessionId, format: &AudioFormat, samples: &[f32]);

    /// The session was released; queued audio for it can be dropped.
    fn close(&self, session: PlaybackSessionId) {
        let _ = session;
    }
}

/// Host audio decoder and output device.
#[async_trait]
pub trait PlaybackAdapter: PlatformSendSync {
    /// Fetch, identify and open `request.url`, acquiring one native resource.
    ///
    /// `listener` receives every status change for the returned session
    /// until it is unloaded.
    async fn prepare(
        &self,
        request: PlaybackRequest,
        listener: Arc<dyn PlaybackStatusListener>,
    ) -> Result<PreparedMedia>;

    /// Start or resume output.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause output, keeping the current position.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Halt output and rewind to the start. The resource stays open.
    async fn stop(&self, session: PlaybackSessionId) -> Result<()>;

    /// Move the playhead. Positions past the end are clamped.
    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Read the current status without side effects.
    async fn status(&self, session: PlaybackSessionId) -> Result<NativeStatus>;

    /// Release the native resource. Unknown sessions are ignored.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        let a = PlaybackSessionId::new();
        let b = PlaybackSessionId::new();
        assert_ne!(a, b);
        assert_eq!(PlaybackSessionId::from_uuid(*a.as_uuid()), a);
    }

    #[test]
    fn test_request_builder() {
        let request = PlaybackRequest::new("https://cdn.example.com/a.mp3")
            .with_start_position(Duration::from_secs(5));
        assert_eq!(request.url, "https://cdn.example.com/a.mp3");
        assert_eq!(request.start_position, Duration::from_secs(5));
    }

    #[test]
    fn test_status_end_detection() {
        let mut status = NativeStatus {
            position: Duration::from_secs(10),
            duration: Some(Duration::from_secs(10)),
            is_playing: true,
            did_just_finish: false,
        };
        assert!(status.is_at_end());

        status.duration = Some(Duration::ZERO);
        assert!(!status.is_at_end());

        status.duration = None;
        assert!(!status.is_at_end());
    }
}
