//! Synchronization primitives.
//!
//! `Mutex` here is the async mutex: hold it across `.await` to serialize
//! whole operations. For short critical sections that never await, prefer a
//! blocking lock (`parking_lot`) in the calling crate.

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedMutexGuard, RwLock,
    RwLockReadGuard, RwLockWriteGuard, Semaphore,
};
