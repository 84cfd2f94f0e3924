//! Integration tests for core-async.

use core_async::{sync, task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[core_async::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[core_async::test]
async fn test_timeout_success() {
    let result = time::timeout(time::Duration::from_millis(100), async {
        time::sleep(time::Duration::from_millis(10)).await;
        42
    })
    .await;

    assert_eq!(result.unwrap(), 42);
}

#[core_async::test(start_paused)]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_secs(100)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[core_async::test(start_paused)]
async fn test_paused_clock_advances_instant() {
    let start = time::Instant::now();
    time::sleep(time::Duration::from_secs(30)).await;
    assert_eq!(start.elapsed(), time::Duration::from_secs(30));
}

#[core_async::test(start_paused)]
async fn test_scoped_task_cancelled_on_drop() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = ticks.clone();

    let guard = task::spawn_scoped(async move {
        let mut interval = time::interval(time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    time::sleep(time::Duration::from_millis(2500)).await;
    assert!(!guard.is_finished());
    drop(guard);

    let seen = ticks.load(Ordering::SeqCst);
    time::sleep(time::Duration::from_secs(5)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), seen);
}

#[core_async::test]
async fn test_scoped_task_shutdown_waits() {
    let (tx, rx) = sync::oneshot::channel::<()>();
    let guard = task::spawn_scoped(async move {
        let _tx = tx;
        std::future::pending::<()>().await;
    });

    guard.shutdown().await;
    // The sender was dropped when the task unwound.
    assert!(rx.await.is_err());
}

#[core_async::test]
async fn test_scoped_task_finishes_naturally() {
    let guard = task::spawn_scoped(async {});
    task::yield_now().await;
    time::sleep(time::Duration::from_millis(5)).await;
    assert!(guard.is_finished());
}

#[core_async::test]
async fn test_watch_channel() {
    let (tx, mut rx) = sync::watch::channel(0u64);
    tx.send(7).unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), 7);
}

#[core_async::test]
async fn test_mutex() {
    let mutex = Arc::new(sync::Mutex::new(0));
    let mutex_clone = mutex.clone();

    let handle = task::spawn(async move {
        let mut guard = mutex_clone.lock().await;
        *guard += 1;
    });

    handle.await.unwrap();

    let guard = mutex.lock().await;
    assert_eq!(*guard, 1);
}

#[core_async::test]
async fn test_select_picks_ready_branch() {
    let (tx, rx) = sync::oneshot::channel::<u8>();
    tx.send(3).unwrap();

    let value = core_async::select! {
        v = rx => v.unwrap(),
        _ = time::sleep(time::Duration::from_secs(60)) => 0,
    };
    assert_eq!(value, 3);
}
