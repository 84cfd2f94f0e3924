//! Marker traits that keep bridge trait bounds in one place.
//!
//! Bridge implementations are shared across async tasks behind `Arc`, so
//! every host-provided object must be `Send + Sync`.

/// Marker trait for `Send + Sync` bridge implementations.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait equivalent to `Send`.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
