use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn wait_for_drain_returns_immediately_when_already_under_threshold() {
    let cancel = CancellationToken::new();
    let drained = wait_for_drain(|| 10, 100, Duration::from_millis(50), &cancel).await;
    assert!(drained);
}

#[tokio::test]
async fn wait_for_drain_times_out_when_buffer_stays_full() {
    let cancel = CancellationToken::new();
    let drained = wait_for_drain(|| 1_000_000, 100, Duration::from_millis(30), &cancel).await;
    assert!(!drained);
}

#[tokio::test]
async fn wait_for_drain_observes_cancellation() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let drained = wait_for_drain(|| 1_000_000, 100, Duration::from_secs(5), &cancel).await;
    assert!(!drained);
}

#[tokio::test]
async fn wait_for_drain_unblocks_once_buffer_shrinks() {
    let cancel = CancellationToken::new();
    let buffered = Arc::new(AtomicUsize::new(500));
    let watcher = Arc::clone(&buffered);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        watcher.store(10, Ordering::SeqCst);
    });
    let drained =
        wait_for_drain(|| buffered.load(Ordering::SeqCst), 100, Duration::from_millis(500), &cancel)
            .await;
    assert!(drained);
}
