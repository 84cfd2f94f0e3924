//! Domain types shared by the resolver, engine and session controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Intent of a media lookup. Selects the storage bucket and the behaviour
/// for a missing reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Audio,
    Image,
    Thumbnail,
    Document,
}

impl MediaCategory {
    /// Missing artwork degrades to a placeholder; missing audio or documents
    /// resolve to nothing.
    pub fn has_placeholder(&self) -> bool {
        matches!(self, MediaCategory::Image | MediaCategory::Thumbnail)
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaCategory::Audio => "audio",
            MediaCategory::Image => "image",
            MediaCategory::Thumbnail => "thumbnail",
            MediaCategory::Document => "document",
        };
        f.write_str(name)
    }
}

/// Identifier of a playable asset: an absolute URL or a bare file name.
///
/// Blank strings are not references; use [`MediaReference::parse`] to map
/// optional catalog fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
    /// Returns `None` for absent or whitespace-only input.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the reference is already a full URL.
    pub fn is_absolute(&self) -> bool {
        is_absolute_url(&self.0)
    }
}

/// A full URL has a scheme followed by a hierarchical part (`scheme://...`).
/// File names that merely contain a colon, such as `ch1:intro.mp3`, parse as
/// opaque URLs and are not treated as absolute.
pub(crate) fn is_absolute_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| !url.cannot_be_a_base())
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a playback engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Error(String),
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    /// States in which transport controls (play, stop, restart) apply.
    pub fn accepts_transport(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PlaybackState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Point-in-time read of the playhead.
///
/// `position_ms` never exceeds a known `duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    #[serde(rename = "positionMillis")]
    pub position_ms: u64,
    #[serde(rename = "durationMillis")]
    pub duration_ms: Option<u64>,
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
}

impl PlaybackSnapshot {
    pub fn new(position: Duration, duration: Option<Duration>, is_playing: bool) -> Self {
        let duration_ms = duration.map(|d| d.as_millis() as u64);
        let mut position_ms = position.as_millis() as u64;
        if let Some(limit) = duration_ms {
            position_ms = position_ms.min(limit);
        }

        Self {
            position_ms,
            duration_ms,
            is_playing,
        }
    }

    /// Snapshot of a freshly loaded resource.
    pub fn at_start(duration: Option<Duration>) -> Self {
        Self::new(Duration::ZERO, duration, false)
    }

    pub fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms)
    }

    /// `true` when the playhead sits at a known, positive duration.
    pub fn is_at_end(&self) -> bool {
        matches!(self.duration_ms, Some(d) if d > 0 && self.position_ms >= d)
    }
}
