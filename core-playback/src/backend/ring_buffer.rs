//! # Ring Buffer for PCM Audio Samples
//!
//! Bounded queue of interleaved `f32` samples between the decoder
//! (producer) and the output sink (consumer).
//!
//! ## Design
//!
//! - **Capacity**: fixed at creation, in samples
//! - **Full buffer**: writes stop at capacity; nothing already queued is
//!   overwritten, so no decoded audio is lost
//! - **Generations**: [`RingBuffer::reset`] starts a new generation. Writes
//!   tagged with an older generation are dropped, which lets a reposition
//!   invalidate a decode that is still in flight
//!
//! ## Usage
//!
//! ```rust,ignore
//! let buffer = RingBuffer::new(8_000 * 2);
//! let generation = buffer.generation();
//!
//! buffer.write(generation, &[0.1, -0.1, 0.2, -0.2]);
//!
//! let mut output = vec![0.0f32; 1024];
//! let read = buffer.read(&mut output);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Default)]
struct RingState {
    samples: VecDeque<f32>,
    generation: u64,
    ended: bool,
}

#[derive(Clone)]
pub struct RingBuffer {
    inner: Arc<Mutex<RingState>>,
    capacity: usize,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingState {
                samples: VecDeque::with_capacity(capacity),
                ..RingState::default()
            })),
            capacity,
        }
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Queue as many of `samples` as fit.
    ///
    /// Returns the number written; 0 when `generation` is stale.
    pub fn write(&self, generation: u64, samples: &[f32]) -> usize {
        let mut state = self.inner.lock();
        if state.generation != generation || state.ended {
            return 0;
        }

        let count = samples.len().min(self.capacity - state.samples.len());
        state.samples.extend(&samples[..count]);
        count
    }

    /// Record that the producer of `generation` has nothing more to write.
    pub fn mark_end(&self, generation: u64) {
        let mut state = self.inner.lock();
        if state.generation == generation {
            state.ended = true;
        }
    }

    /// Move up to `output.len()` samples into `output`, oldest first.
    ///
    /// Returns the number of samples read.
    pub fn read(&self, output: &mut [f32]) -> usize {
        let mut state = self.inner.lock();
        let count = output.len().min(state.samples.len());
        for (slot, sample) in output.iter_mut().zip(state.samples.drain(..count)) {
            *slot = sample;
        }
        count
    }

    /// Samples currently available to read.
    pub fn available(&self) -> usize {
        self.inner.lock().samples.len()
    }

    /// Samples that can be written before the buffer is full.
    pub fn free_space(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// `true` once the producer ended and every sample has been read.
    pub fn is_drained(&self) -> bool {
        let state = self.inner.lock();
        state.ended && state.samples.is_empty()
    }

    /// Drop queued samples and start a new generation, which it returns.
    pub fn reset(&self) -> u64 {
        let mut state = self.inner.lock();
        state.samples.clear();
        state.ended = false;
        state.generation += 1;
        state.generation
    }
}
