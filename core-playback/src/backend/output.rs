//! Decode-ahead PCM pipeline feeding an [`AudioSink`].
//!
//! ```text
//! PcmDecoder ──fill (blocking)──▶ RingBuffer ──deliver (paced by clock)──▶ AudioSink
//! ```
//!
//! Lock order: decoder, then control, then the ring buffer.

use std::time::Duration;

use bridge_traits::{AudioFormat, AudioSink, PlaybackSessionId};
use parking_lot::Mutex;

use super::ring_buffer::RingBuffer;
use crate::decoder::PcmDecoder;
use crate::error::Result;

/// How far ahead of the playhead the decoder runs.
pub(crate) const LOOKAHEAD: Duration = Duration::from_millis(500);

/// Ring buffer span.
const BUFFER_SPAN: Duration = Duration::from_secs(2);

/// Sink that drops every sample. The default for hosts without an output
/// device, where only the playhead matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl AudioSink for DiscardSink {
    fn write(&self, _session: PlaybackSessionId, _format: &AudioFormat, _samples: &[f32]) {}
}

/// Frame index at `position`, rounded down.
pub(crate) fn frames_at(position: Duration, sample_rate: u32) -> u64 {
    (position.as_nanos() * u128::from(sample_rate) / 1_000_000_000) as u64
}

/// Playhead position of frame index `frames`.
pub(crate) fn position_of(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = u128::from(frames) * 1_000_000_000 / u128::from(sample_rate);
    Duration::from_nanos(nanos as u64)
}

struct Control {
    /// Frame to reposition the decoder to before the next fill.
    seek_to: Option<u64>,
    /// Frames handed to the sink, counted from the start of the track.
    rendered: u64,
}

/// One session's decoder, decoded-sample queue and delivery cursor.
pub(crate) struct Pipeline {
    format: AudioFormat,
    decoder: Mutex<PcmDecoder>,
    control: Mutex<Control>,
    buffer: RingBuffer,
}

impl Pipeline {
    pub(crate) fn new(decoder: PcmDecoder) -> Self {
        let format = decoder.format().clone();
        let channels = usize::from(format.channels.max(1));
        let capacity = frames_at(BUFFER_SPAN, format.sample_rate) as usize * channels;
        Self {
            format,
            decoder: Mutex::new(decoder),
            control: Mutex::new(Control {
                seek_to: None,
                rendered: 0,
            }),
            buffer: RingBuffer::new(capacity.max(channels)),
        }
    }

    pub(crate) fn format(&self) -> &AudioFormat {
        &self.format
    }

    fn channels(&self) -> usize {
        usize::from(self.format.channels.max(1))
    }

    pub(crate) fn rendered(&self) -> u64 {
        self.control.lock().rendered
    }

    /// Every decoded frame has been delivered and the stream is over.
    pub(crate) fn is_drained(&self) -> bool {
        self.buffer.is_drained()
    }

    /// Continue output from `frame`. Queued audio is discarded and any
    /// decode in flight is invalidated.
    pub(crate) fn reposition(&self, frame: u64) {
        let mut control = self.control.lock();
        self.buffer.reset();
        control.seek_to = Some(frame);
        control.rendered = frame;
    }

    /// Decode until `frames` frames are queued, the buffer is full, or the
    /// stream ends. Blocks on decoding and on the download.
    pub(crate) fn fill(&self, frames: u64) -> Result<()> {
        let mut decoder = self.decoder.lock();
        let (seek_to, generation) = {
            let mut control = self.control.lock();
            (control.seek_to.take(), self.buffer.generation())
        };

        if let Some(frame) = seek_to {
            if let Err(err) = decoder.seek_to(frame) {
                self.buffer.mark_end(generation);
                return Err(err);
            }
        }

        let channels = self.channels();
        let queued = (self.buffer.available() / channels) as u64;
        let room = (self.buffer.free_space() / channels) as u64;
        let wanted = frames.saturating_sub(queued).min(room) as usize;
        if wanted == 0 {
            return Ok(());
        }

        let mut samples = Vec::with_capacity(wanted * channels);
        let read = match decoder.read_frames(wanted, &mut samples) {
            Ok(read) => read,
            Err(err) => {
                self.buffer.mark_end(generation);
                return Err(err);
            }
        };
        self.buffer.write(generation, &samples);
        if read < wanted {
            self.buffer.mark_end(generation);
        }
        Ok(())
    }

    /// Hand up to `frames` queued frames to `sink`. Returns how many were
    /// delivered.
    pub(crate) fn deliver(
        &self,
        session: PlaybackSessionId,
        sink: &dyn AudioSink,
        frames: u64,
    ) -> u64 {
        if frames == 0 {
            return 0;
        }

        let channels = self.channels();
        let mut samples = vec![0.0; frames as usize * channels];
        let delivered = {
            let mut control = self.control.lock();
            let read = self.buffer.read(&mut samples) / channels;
            control.rendered += read as u64;
            read
        };

        if delivered > 0 {
            sink.write(session, &self.format, &samples[..delivered * channels]);
        }
        delivered as u64
    }
}
