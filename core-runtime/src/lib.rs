//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the Lectern playback core:
//! - Logging and tracing setup
//! - Configuration (media endpoints, injected bridges)
//! - Event bus
//!
//! Every other core crate depends on this one for these concerns.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
