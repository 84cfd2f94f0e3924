//! Growable byte source shared between a download and a decoder.
//!
//! The download task appends chunks as they arrive; the decoder reads
//! through a [`StreamReader`] on a blocking thread. Reads past the bytes
//! received so far wait until more data arrives or the download ends.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use symphonia::core::io::MediaSource;

#[derive(Debug, Clone, PartialEq, Eq)]
enum End {
    Complete,
    Failed(String),
}

#[derive(Default)]
struct State {
    data: Vec<u8>,
    end: Option<End>,
}

struct Shared {
    state: Mutex<State>,
    grew: Condvar,
}

/// Bytes of one media resource, filled incrementally.
#[derive(Clone)]
pub struct StreamBuffer {
    shared: Arc<Shared>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                grew: Condvar::new(),
            }),
        }
    }

    /// A buffer that already holds the complete resource.
    pub fn from_bytes(data: Bytes) -> Self {
        let buffer = Self::new();
        buffer.append(&data);
        buffer.finish();
        buffer
    }

    /// Add received bytes. Ignored once the buffer has ended.
    pub fn append(&self, chunk: &[u8]) {
        let mut state = self.shared.state.lock();
        if state.end.is_some() || chunk.is_empty() {
            return;
        }
        state.data.extend_from_slice(chunk);
        self.shared.grew.notify_all();
    }

    /// Mark the download complete.
    pub fn finish(&self) {
        self.end_with(End::Complete);
    }

    /// Mark the download failed. Readers waiting past the received bytes
    /// get an I/O error carrying `reason`.
    pub fn fail(&self, reason: impl Into<String>) {
        self.end_with(End::Failed(reason.into()));
    }

    fn end_with(&self, end: End) {
        let mut state = self.shared.state.lock();
        if state.end.is_none() {
            state.end = Some(end);
            self.shared.grew.notify_all();
        }
    }

    /// Why the download failed, if it did.
    pub fn failure(&self) -> Option<String> {
        match &self.shared.state.lock().end {
            Some(End::Failed(reason)) => Some(reason.clone()),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.shared.state.lock().end == Some(End::Complete)
    }

    /// Bytes received so far.
    pub fn len(&self) -> usize {
        self.shared.state.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Independent reader positioned at the start.
    pub fn reader(&self) -> StreamReader {
        StreamReader {
            shared: Arc::clone(&self.shared),
            position: 0,
        }
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking reader over a [`StreamBuffer`].
pub struct StreamReader {
    shared: Arc<Shared>,
    position: u64,
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.shared.state.lock();
        loop {
            let received = state.data.len() as u64;
            if self.position < received {
                let start = self.position as usize;
                let count = buf.len().min(state.data.len() - start);
                buf[..count].copy_from_slice(&state.data[start..start + count]);
                self.position += count as u64;
                return Ok(count);
            }

            match &state.end {
                Some(End::Complete) => return Ok(0),
                Some(End::Failed(reason)) => {
                    return Err(io::Error::new(io::ErrorKind::Other, reason.clone()))
                }
                None => self.shared.grew.wait(&mut state),
            }
        }
    }
}

impl Seek for StreamReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let state = self.shared.state.lock();
                if state.end != Some(End::Complete) {
                    return Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "length unknown until the download completes",
                    ));
                }
                (state.data.len() as u64).checked_add_signed(delta)
            }
        };

        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        self.position = target;
        Ok(target)
    }
}

impl MediaSource for StreamReader {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        let state = self.shared.state.lock();
        match state.end {
            Some(End::Complete) => Some(state.data.len() as u64),
            _ => None,
        }
    }
}
