//! Async runtime abstraction layer for the Lectern playback core.
//!
//! Every `core-*` crate goes through this crate instead of naming Tokio
//! directly, so the executor stays a single decision made in one place.
//!
//! # Modules
//!
//! - `task`: task spawning plus [`task::TaskGuard`], a scoped handle that
//!   cancels its task when dropped
//! - `time`: sleep, interval, timeout and a monotonic `Instant` that follows
//!   the runtime clock (including a paused test clock)
//! - `sync`: channels and async locks
//! - `runtime`: `block_on` helpers used by the attribute macros
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let guard = task::spawn_scoped(async {
//!         loop {
//!             sleep(Duration::from_secs(1)).await;
//!         }
//!     });
//!
//!     // Dropping the guard aborts the loop.
//!     drop(guard);
//! }
//! ```

pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::{spawn, spawn_scoped, TaskGuard};
pub use time::{sleep, Duration, Instant};

/// Waits on multiple concurrent branches, returning when the first completes.
pub use tokio::select;
