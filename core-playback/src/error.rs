//! # Playback Error Types
//!
//! Load and playback failures are recoverable: the engine records them as
//! [`PlaybackState::Error`](crate::types::PlaybackState::Error) and the user
//! may retry. [`PlaybackError::InvalidOperation`] is a caller bug (for
//! example `play` with nothing loaded) and is filtered out by the session
//! controller before it reaches the presentation layer.

use bridge_traits::BridgeError;
use thiserror::Error;

/// User-facing message recorded when a load fails.
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load audio";

/// User-facing message recorded when the output device fails mid-playback.
pub const PLAYBACK_FAILURE_MESSAGE: &str = "Playback failed";

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Network, decode, or unsupported-format failure while loading.
    #[error("Failed to load audio: {0}")]
    LoadFailure(String),

    /// Output device error while a resource is loaded.
    #[error("Playback failed: {0}")]
    PlaybackFailure(String),

    /// Operation is not valid in the current state.
    #[error("Invalid playback operation: {0}")]
    InvalidOperation(String),

    /// Container or codec could not be recognized.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The container was recognized but its audio could not be decoded.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PlaybackError::InvalidOperation(message.into())
    }

    /// Whether the user may retry the failed operation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlaybackError::LoadFailure(_) | PlaybackError::PlaybackFailure(_) => true,
            PlaybackError::Bridge(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Whether the error is a programming error rather than a runtime failure.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, PlaybackError::InvalidOperation(_))
    }

    /// Format problems cannot be fixed by retrying the same URL.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::UnsupportedFormat(_) | PlaybackError::DecodingError(_)
        )
    }
}

impl From<PlaybackError> for BridgeError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::Bridge(inner) => inner,
            PlaybackError::UnsupportedFormat(msg) | PlaybackError::DecodingError(msg) => {
                BridgeError::Unsupported(msg)
            }
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

impl From<core_runtime::Error> for PlaybackError {
    fn from(err: core_runtime::Error) -> Self {
        PlaybackError::Config(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
