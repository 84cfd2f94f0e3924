//! Time-related abstractions.
//!
//! `Instant` is the runtime's instant rather than `std::time::Instant`, so
//! elapsed-time arithmetic follows the runtime clock. Under a paused test
//! runtime (`#[core_async::test(start_paused)]`) it advances only when the
//! runtime advances time.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_secs(1)).await;
//!     println!("Took {:?}", start.elapsed());
//! }
//! ```

pub use tokio::time::{
    interval, interval_at, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior,
    Sleep, Timeout,
};

pub use std::time::Duration;

/// Error returned by [`timeout`] when the deadline expires.
pub use tokio::time::error::Elapsed;
