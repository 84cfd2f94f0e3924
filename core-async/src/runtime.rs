//! Runtime utilities that wrap the underlying executor.
//!
//! Downstream crates (and the `#[core_async::test]` macro) use these helpers
//! so they never have to construct a Tokio runtime themselves.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a fresh current-thread runtime.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Returns a handle to the runtime driving the current task, if any.
pub fn try_current() -> Option<Handle> {
    Handle::try_current().ok()
}
