//! Incremental PCM decoding over a [`StreamBuffer`].

use std::collections::VecDeque;
use std::time::Duration;

use bridge_traits::{AudioCodec, AudioFormat};
use core_runtime::logging::redact_url;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::units::TimeBase;
use tracing::{debug, instrument, warn};

use crate::decoder::format_detector::FormatDetector;
use crate::decoder::source::StreamBuffer;
use crate::error::{PlaybackError, Result};

/// Consecutive undecodable packets tolerated before giving up.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Decoder for the first audio track of a media resource, producing
/// interleaved `f32` frames on demand.
///
/// Blocks while the underlying download catches up; run it on a blocking
/// thread.
pub struct PcmDecoder {
    source: StreamBuffer,
    url: String,
    content_type: Option<String>,
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    format: AudioFormat,
    duration: Option<Duration>,
    pending: VecDeque<f32>,
    /// Frame index of the next frame handed out.
    position: u64,
    finished: bool,
}

impl PcmDecoder {
    /// Identify the container and codec of `source` and decode its first
    /// packet.
    ///
    /// `url` and `content_type` only feed the format hint.
    #[instrument(skip(source, url, content_type), fields(url = %redact_url(url)))]
    pub fn open(source: StreamBuffer, url: &str, content_type: Option<&str>) -> Result<Self> {
        let hint = FormatDetector::hint_for(url, content_type);
        let stream = MediaSourceStream::new(
            Box::new(source.reader()),
            MediaSourceStreamOptions::default(),
        );

        let detected = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                PlaybackError::UnsupportedFormat(format!("Failed to detect format: {}", e))
            })?;
        let reader = detected.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::UnsupportedFormat("No audio track".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let codec = FormatDetector::detect_codec(params.codec);
        if codec == AudioCodec::Unknown {
            return Err(PlaybackError::UnsupportedFormat(format!(
                "Unsupported codec {:?}",
                params.codec
            )));
        }

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| PlaybackError::UnsupportedFormat("Missing sample rate".to_string()))?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let duration = params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::UnsupportedFormat(format!("No decoder available: {}", e)))?;

        let mut pcm = Self {
            source,
            url: url.to_string(),
            content_type: content_type.map(str::to_string),
            reader,
            decoder,
            track_id,
            time_base: params.time_base,
            format: AudioFormat {
                codec,
                sample_rate,
                channels,
                bits_per_sample: params.bits_per_sample.map(|b| b as u16),
            },
            duration,
            pending: VecDeque::new(),
            position: 0,
            finished: false,
        };

        if !pcm.decode_packet()? {
            return Err(PlaybackError::DecodingError(
                "Stream contains no audio packets".to_string(),
            ));
        }

        debug!(format = ?pcm.format, ?duration, "Opened decoder");
        Ok(pcm)
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Track length from the container header, if it declares one.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Frame index of the next frame [`read_frames`](Self::read_frames)
    /// returns.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// `true` once the stream is exhausted and nothing is pending.
    pub fn is_finished(&self) -> bool {
        self.finished && self.pending.is_empty()
    }

    fn channels(&self) -> usize {
        usize::from(self.format.channels.max(1))
    }

    /// Append up to `frames` interleaved frames to `out`.
    ///
    /// Returns the number of frames appended; fewer than requested means
    /// the stream ended.
    pub fn read_frames(&mut self, frames: usize, out: &mut Vec<f32>) -> Result<usize> {
        let channels = self.channels();
        let wanted = frames * channels;
        while self.pending.len() < wanted && !self.finished {
            self.decode_packet()?;
        }

        let take = wanted.min(self.pending.len()) / channels * channels;
        out.extend(self.pending.drain(..take));
        let read = take / channels;
        self.position += read as u64;
        Ok(read)
    }

    /// Discard up to `frames` frames. Returns how many were discarded.
    pub fn skip_frames(&mut self, frames: u64) -> Result<u64> {
        let channels = self.channels();
        let mut remaining = frames;
        while remaining > 0 {
            let available = (self.pending.len() / channels) as u64;
            if available == 0 {
                if !self.decode_packet()? {
                    break;
                }
                continue;
            }

            let skipped = available.min(remaining);
            self.pending.drain(..skipped as usize * channels);
            self.position += skipped;
            remaining -= skipped;
        }
        Ok(frames - remaining)
    }

    /// Position the decoder so the next frame read is `frame`.
    ///
    /// Uses the container's seek index when it has one and decodes forward
    /// from the start otherwise.
    pub fn seek_to(&mut self, frame: u64) -> Result<()> {
        self.pending.clear();
        self.finished = false;

        let to = SeekTo::TimeStamp {
            ts: self.frames_to_ts(frame),
            track_id: self.track_id,
        };
        match self.reader.seek(SeekMode::Accurate, to) {
            Ok(seeked) => {
                self.decoder.reset();
                self.position = self.ts_to_frames(seeked.actual_ts);
            }
            Err(e) => {
                debug!(error = %e, "Container seek failed; decoding from the start");
                self.reopen()?;
            }
        }

        if self.position > frame {
            self.reopen()?;
        }
        let target = frame - self.position;
        self.skip_frames(target)?;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        *self = Self::open(self.source.clone(), &self.url, self.content_type.as_deref())?;
        Ok(())
    }

    fn frames_to_ts(&self, frame: u64) -> u64 {
        match self.time_base {
            Some(tb) if tb.numer > 0 => {
                let rate = u128::from(self.format.sample_rate) * u128::from(tb.numer);
                (u128::from(frame) * u128::from(tb.denom) / rate) as u64
            }
            _ => frame,
        }
    }

    fn ts_to_frames(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(tb) if tb.denom > 0 => {
                let scaled = u128::from(ts)
                    * u128::from(tb.numer)
                    * u128::from(self.format.sample_rate);
                (scaled / u128::from(tb.denom)) as u64
            }
            _ => ts,
        }
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns `false` at end of stream.
    fn decode_packet(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }

        let mut consecutive_errors = 0;
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!(position = self.position, "Reached end of stream");
                    self.finished = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!("Track list changed mid-stream; ending playback here");
                    self.finished = true;
                    return Ok(false);
                }
                Err(e) => {
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to read packet: {}",
                        e
                    )))
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let spec = *decoded.spec();
                    let decoded_channels = spec.channels.count() as u16;
                    if decoded_channels != self.format.channels && self.position == 0 {
                        debug!(
                            from = self.format.channels,
                            to = decoded_channels,
                            "Channel count taken from decoded audio"
                        );
                        self.format.channels = decoded_channels;
                    }

                    let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    samples.copy_interleaved_ref(decoded);
                    self.pending.extend(samples.samples());
                    return Ok(true);
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    consecutive_errors += 1;
                    warn!(error = err, consecutive_errors, "Skipping undecodable packet");
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(PlaybackError::DecodingError(format!(
                            "Decoder failure after {} packets: {}",
                            MAX_CONSECUTIVE_ERRORS, err
                        )));
                    }
                }
                Err(e) => {
                    return Err(PlaybackError::DecodingError(format!(
                        "Failed to decode: {}",
                        e
                    )))
                }
            }
        }
    }
}
