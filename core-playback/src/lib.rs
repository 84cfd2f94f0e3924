//! # Playback Module
//!
//! Audio playback for the Lectern core.
//!
//! ## Overview
//!
//! - [`MediaResolver`] turns catalog media references into fetchable URLs
//! - [`PlaybackEngine`] owns one native playback resource at a time and runs
//!   the load / play / pause / stop state machine on top of a host
//!   [`PlaybackAdapter`](bridge_traits::PlaybackAdapter)
//! - [`PlaybackSession`] binds a UI "now playing" slot to an engine and keeps
//!   progress current while audio plays
//! - [`backend::HttpPlaybackAdapter`] (feature `http-adapter`) is a built-in
//!   adapter that streams over HTTP, decodes with Symphonia and renders PCM
//!   to a host [`AudioSink`](bridge_traits::AudioSink)
//!
//! ## Example
//!
//! ```ignore
//! use core_playback::{MediaReference, MediaResolver, PlaybackConfig, PlaybackEngine, PlaybackSession};
//!
//! let resolver = Arc::new(MediaResolver::new(endpoints)?);
//! let engine = PlaybackEngine::new(adapter, PlaybackConfig::default(), Some(bus.clone()))?;
//! let session = PlaybackSession::new(engine, resolver, Some(bus));
//!
//! session.select(MediaReference::parse(Some("chapter-01.mp3"))).await?;
//! session.play().await;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod session;
pub mod types;

#[cfg(feature = "http-adapter")]
pub mod backend;

#[cfg(feature = "http-adapter")]
pub mod decoder;

pub use config::PlaybackConfig;
pub use engine::{EngineStatus, LoadOutcome, PlaybackEngine};
pub use error::{PlaybackError, Result, LOAD_FAILURE_MESSAGE, PLAYBACK_FAILURE_MESSAGE};
pub use resolver::MediaResolver;
pub use session::{PlaybackSession, SelectOutcome};
pub use types::{MediaCategory, MediaReference, PlaybackSnapshot, PlaybackState};

#[cfg(feature = "http-adapter")]
pub use backend::{DiscardSink, HttpPlaybackAdapter};
