//! # Playback Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the playback engine and session controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Cadence of the progress poll while playing.
    ///
    /// Default: 1 second.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Upper bound for a single load. `None` waits indefinitely and a hung
    /// fetch shows as a lasting `Loading` state.
    ///
    /// Default: none.
    #[serde(default)]
    pub load_timeout: Option<Duration>,

    /// Slack when comparing position against duration for the end-of-track
    /// check. Some containers report a duration a few milliseconds longer
    /// than the last decodable frame.
    ///
    /// Default: 0.
    #[serde(default)]
    pub end_of_track_tolerance: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            load_timeout: None,
            end_of_track_tolerance: Duration::ZERO,
        }
    }
}

impl PlaybackConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    pub fn with_end_of_track_tolerance(mut self, tolerance: Duration) -> Self {
        self.end_of_track_tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be > 0".to_string());
        }

        if matches!(self.load_timeout, Some(t) if t.is_zero()) {
            return Err("load_timeout must be > 0 when set".to_string());
        }

        Ok(())
    }

    /// Whether `position` counts as the end of a track of length `duration`.
    pub fn is_at_end(&self, position: Duration, duration: Option<Duration>) -> bool {
        match duration {
            Some(d) if !d.is_zero() => position.saturating_add(self.end_of_track_tolerance) >= d,
            _ => false,
        }
    }
}
