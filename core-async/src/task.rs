//! Task spawning and scoped task ownership.
//!
//! [`spawn`] is a thin wrapper over the runtime's spawner. [`spawn_scoped`]
//! returns a [`TaskGuard`] instead of a bare `JoinHandle`: the task lives
//! exactly as long as the guard, and dropping the guard on any exit path
//! (normal return, `?` early-out, panic unwind) cancels it.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     let result = handle.await.unwrap();
//!     assert_eq!(result, 42);
//! }
//! ```

use std::future::Future;

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// The task is detached: dropping the returned handle does not cancel it.
/// Use [`spawn_scoped`] when the task must not outlive its owner.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Spawns a task whose lifetime is bound to the returned guard.
pub fn spawn_scoped<F>(future: F) -> TaskGuard
where
    F: Future<Output = ()> + Send + 'static,
{
    TaskGuard {
        handle: Some(tokio::task::spawn(future)),
    }
}

/// Owning handle for a background task. Aborts the task on drop.
#[derive(Debug)]
pub struct TaskGuard {
    handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
    /// Returns `true` once the task has returned or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Requests cancellation without waiting for the task to unwind.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Cancels the task and waits until it has fully stopped.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // A cancelled JoinError is the expected outcome here.
            let _ = handle.await;
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
