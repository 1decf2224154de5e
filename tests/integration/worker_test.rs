//! Background worker

use crate::common::*;
use crate::recv_within;
use eventsync::client::sync::SyncManager;
use eventsync::shared::{SyncEvent, SyncEventType, SyncPolicy};
use std::sync::Arc;
use tokio::sync::broadcast;

async fn next_complete(events: &mut broadcast::Receiver<SyncEvent>) -> SyncEvent {
    loop {
        let event = recv_within!(events);
        if event.event_type == SyncEventType::SyncComplete {
            return event;
        }
    }
}

#[tokio::test]
async fn test_reconnect_triggers_replay() {
    let backend = Arc::new(MockBackend::new());
    let manager = Arc::new(offline_manager(backend.clone()).await);
    manager.enqueue(vote("a")).await.unwrap();
    manager.enqueue(vote("b")).await.unwrap();

    let mut events = manager.subscribe();
    let worker = manager.clone().spawn();
    assert!(worker.is_running());

    manager.network().apply(signal(true)).await;
    let complete = next_complete(&mut events).await;
    assert_eq!(complete.completed_count, Some(2));
    assert_eq!(complete.pending_count, Some(0));
    assert_eq!(backend.applied_options(), vec!["a", "b"]);

    worker.shutdown().await;
}

#[tokio::test]
async fn test_sync_now_runs_a_manual_pass() {
    let backend = Arc::new(MockBackend::new());
    let policy = SyncPolicy {
        retry_interval_secs: 3600,
        ..SyncPolicy::default()
    };
    let manager = Arc::new(manager_with(backend.clone(), true, policy).await);
    let mut events = manager.subscribe();
    let worker = manager.clone().spawn();

    manager.enqueue(vote("a")).await.unwrap();
    assert!(worker.sync_now().await);

    let complete = next_complete(&mut events).await;
    assert_eq!(complete.completed_count, Some(1));
    worker.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_the_worker() {
    let manager: Arc<SyncManager> = Arc::new(offline_manager(Arc::new(MockBackend::new())).await);
    let worker = manager.clone().spawn();
    worker.shutdown().await;

    // queueing does not depend on the worker
    manager.enqueue(vote("a")).await.unwrap();
    assert_eq!(manager.pending_actions().await, 1);
}
