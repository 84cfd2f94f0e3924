//! Built-in [`PlaybackAdapter`](bridge_traits::PlaybackAdapter)
//! implementations.

mod clock;
mod http;
mod output;
mod ring_buffer;

pub use clock::PlaybackClock;
pub use http::HttpPlaybackAdapter;
pub use output::DiscardSink;
pub use ring_buffer::RingBuffer;
