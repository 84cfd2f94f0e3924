//! # Media Decoding
//!
//! Symphonia-based decoding for streamed media. The HTTP playback adapter
//! appends downloaded chunks to a [`StreamBuffer`] while a [`PcmDecoder`]
//! reads from it on a blocking thread, so decoding starts before the body
//! has fully arrived.
//!
//! ```text
//! HTTP chunks → StreamBuffer → MediaSourceStream → FormatReader → Decoder → f32 frames
//! ```

mod format_detector;
mod pcm;
mod source;

pub use format_detector::FormatDetector;
pub use pcm::PcmDecoder;
pub use source::{StreamBuffer, StreamReader};

#[cfg(test)]
pub(crate) use pcm::tests::{ramp_frame, wav_bytes};
