//! # Bridge Traits
//!
//! Host-provided capabilities the Lectern core depends on.
//!
//! The core never talks to an audio device, a socket or a platform logger
//! directly. Each host (desktop, mobile shell, test harness) supplies
//! implementations of the traits below and injects them at startup.
//!
//! ## Traits
//!
//! - [`PlaybackAdapter`]: the native audio decoder and output device, one
//!   resource per prepared session
//! - [`PlaybackStatusListener`]: callback for native status changes
//! - [`AudioSink`]: PCM output for the core's built-in decoder
//! - [`HttpClient`]: plain HTTP transport for fetching media, buffered or
//!   streamed
//! - [`LoggerSink`]: optional mirror of structured logs into the host
//!
//! ## Error Handling
//!
//! All bridge operations return [`error::Result`]. Implementations should map
//! platform failures onto [`BridgeError`] variants; the core decides which of
//! them are user-visible.
//!
//! ## Thread Safety
//!
//! Implementations are shared behind `Arc` across async tasks, so every trait
//! requires [`platform::PlatformSendSync`].

pub mod error;
pub mod http;
pub mod logging;
pub mod platform;
pub mod playback;

pub use error::BridgeError;

pub use http::{
    ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStream, RetryPolicy,
};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use platform::{PlatformSend, PlatformSendSync};
pub use playback::{
    AudioCodec, AudioFormat, AudioSink, NativeStatus, PlaybackAdapter, PlaybackRequest,
    PlaybackSessionId, PlaybackStatusListener, PreparedMedia,
};
