use std::time::Duration;

use core_async::time::Instant;

/// Virtual playhead driven by the runtime's monotonic clock.
///
/// Position is `base + elapsed since start`, clamped to the duration when it
/// is known.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    base: Duration,
    started_at: Option<Instant>,
    duration: Option<Duration>,
}

impl PlaybackClock {
    pub fn new(duration: Option<Duration>) -> Self {
        Self {
            base: Duration::ZERO,
            started_at: None,
            duration,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Fix the length once it becomes known, e.g. when a stream without a
    /// declared length runs out.
    pub fn set_duration(&mut self, duration: Option<Duration>) {
        self.duration = duration;
        self.base = self.clamp(self.base);
        if self.is_running() && self.is_at_end() {
            self.pause();
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn position(&self) -> Duration {
        let elapsed = self
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();
        self.clamp(self.base.saturating_add(elapsed))
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.duration, Some(d) if !d.is_zero() && self.position() >= d)
    }

    /// Time until the end of the track, when the duration is known.
    pub fn remaining(&self) -> Option<Duration> {
        self.duration
            .map(|duration| duration.saturating_sub(self.position()))
    }

    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        self.base = self.position();
        self.started_at = None;
    }

    pub fn seek(&mut self, position: Duration) {
        self.base = self.clamp(position);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Halt and rewind.
    pub fn reset(&mut self) {
        self.base = Duration::ZERO;
        self.started_at = None;
    }

    fn clamp(&self, position: Duration) -> Duration {
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}
