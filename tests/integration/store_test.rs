//! Persistence across restarts

use crate::common::*;
use eventsync::client::local_db::LocalStore;
use eventsync::client::offline::{MutationQueue, MutationStatus, RetryPolicy};
use eventsync::client::sync::{NetworkMonitor, SubmitOutcome, SyncManager, SyncTrigger};
use eventsync::shared::{SocketEventKind, SyncPolicy};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

async fn reopen(dir: &TempDir, backend: Arc<MockBackend>, online: bool) -> SyncManager {
    SyncManager::new(
        LocalStore::open(dir.path().join("offline.db")).await,
        backend,
        NetworkMonitor::new(signal(online)),
        SyncPolicy::default(),
    )
    .await
}

#[tokio::test]
async fn test_queue_survives_restart_in_order() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());

    {
        let manager = reopen(&dir, backend.clone(), false).await;
        for option in ["a", "b", "c"] {
            let outcome = manager.submit(vote(option)).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Queued { durable: true, .. }));
        }
    }

    let manager = reopen(&dir, backend.clone(), true).await;
    assert_eq!(manager.pending_actions().await, 3);
    assert_eq!(manager.status().await.pending_actions, 3);

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.completed, 3);
    assert_eq!(backend.applied_options(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_in_flight_items_are_recovered_as_pending() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("offline.db");

    let queued = {
        let queue = MutationQueue::new(LocalStore::open(&path).await, RetryPolicy::default());
        let mut item = queue.enqueue(vote("a")).await.unwrap();
        queue.mark_in_flight(&mut item).await;
        // crash before the response arrives
        item
    };

    let backend = Arc::new(MockBackend::new());
    let manager = reopen(&dir, backend.clone(), true).await;
    let items = manager.queued().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, queued.id);
    assert_eq!(items[0].status, MutationStatus::Pending);

    manager.replay(SyncTrigger::Reconnected).await;
    assert_eq!(backend.applied()[0].idempotency_key, queued.idempotency_key.to_string());
}

#[tokio::test]
async fn test_last_sync_time_persists() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());

    {
        let manager = reopen(&dir, backend.clone(), true).await;
        manager.enqueue(vote("a")).await.unwrap();
        manager.replay(SyncTrigger::Manual).await;
    }

    let manager = reopen(&dir, backend, false).await;
    assert!(manager.status().await.last_sync.is_some());
}

#[tokio::test]
async fn test_unwritable_location_keeps_writes_for_this_run() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let store = LocalStore::open(blocker.join("offline.db")).await;
    assert!(!store.is_available());

    let backend = Arc::new(MockBackend::new());
    let manager = SyncManager::new(store, backend.clone(), NetworkMonitor::new(signal(false)), SyncPolicy::default()).await;

    let outcome = manager.submit(vote("a")).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Queued { durable: false, .. }));
    manager.submit(vote("b")).await.unwrap();
    assert_eq!(manager.pending_actions().await, 2);

    manager.network().apply(signal(true)).await;
    let report = manager.replay(SyncTrigger::Reconnected).await;
    assert!(report.ran);
    assert_eq!(report.completed, 2);
    assert_eq!(backend.applied_options(), vec!["a", "b"]);
    assert_eq!(manager.pending_actions().await, 0);
}

#[tokio::test]
async fn test_unavailable_store_queues_socket_events_in_memory() {
    let backend = Arc::new(MockBackend::new());
    let manager = SyncManager::new(
        LocalStore::unavailable(),
        backend.clone(),
        NetworkMonitor::new(signal(false)),
        SyncPolicy::default(),
    )
    .await;
    let emitter = Arc::new(RecordingEmitter::new());
    let manager = manager.with_emitter(emitter.clone());

    manager
        .enqueue_socket_event(SocketEventKind::ChatSend {
            session_id: "session-1".to_string(),
            text: "hello".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(manager.pending_actions().await, 1);

    manager.network().apply(signal(true)).await;
    let report = manager.replay(SyncTrigger::Reconnected).await;
    assert_eq!(report.completed, 1);
    assert_eq!(emitter.emitted().len(), 1);
    assert_eq!(manager.pending_actions().await, 0);
}

#[tokio::test]
async fn test_unavailable_store_still_sends_online_writes() {
    let backend = Arc::new(MockBackend::new());
    let manager = SyncManager::new(
        LocalStore::unavailable(),
        backend.clone(),
        NetworkMonitor::new(signal(true)),
        SyncPolicy::default(),
    )
    .await;

    let outcome = manager.submit(vote("a")).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Sent { .. }));
    assert_eq!(backend.applied_options(), vec!["a"]);
}
