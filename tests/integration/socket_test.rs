//! Socket event replay

use crate::common::*;
use eventsync::client::sync::{StopReason, SyncTrigger};
use eventsync::client::transport::ChannelEmitter;
use eventsync::shared::{SocketEventKind, SyncError, SyncEventType, SyncPolicy};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn chat(session: &str, text: &str) -> SocketEventKind {
    SocketEventKind::ChatSend {
        session_id: session.to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_socket_events_replay_in_order_after_mutations() {
    let backend = Arc::new(MockBackend::new());
    let emitter = Arc::new(RecordingEmitter::new());
    let manager = offline_manager(backend.clone()).await.with_emitter(emitter.clone());

    manager.enqueue_socket_event(chat("keynote", "first")).await.unwrap();
    manager.enqueue(vote("a")).await.unwrap();
    manager.enqueue_socket_event(chat("keynote", "second")).await.unwrap();
    manager
        .enqueue_socket_event(SocketEventKind::AskQuestion {
            session_id: "panel".to_string(),
            text: "Will slides be shared?".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(manager.pending_actions().await, 4);

    manager.network().apply(signal(true)).await;
    let report = manager.replay(SyncTrigger::Reconnected).await;

    assert_eq!(report.completed, 4);
    assert_eq!(manager.pending_actions().await, 0);
    assert_eq!(backend.calls(), 1);

    let emitted = emitter.emitted();
    assert_eq!(emitted.len(), 3);
    let keynote: Vec<_> = emitted
        .iter()
        .filter(|(_, payload)| payload["sessionId"] == "keynote")
        .map(|(_, payload)| payload["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keynote, vec!["first", "second"]);
    assert!(emitted.iter().any(|(name, _)| name == "qa:ask"));
    assert!(emitted.iter().all(|(_, payload)| payload["idempotencyKey"].is_string()));
}

#[tokio::test]
async fn test_socket_events_wait_while_mutations_are_failing() {
    let backend = Arc::new(MockBackend::with_script(vec![MockReply::Fail(SyncError::transient("reset"))]));
    let emitter = Arc::new(RecordingEmitter::new());
    let manager = offline_manager(backend).await.with_emitter(emitter.clone());
    manager.enqueue(vote("a")).await.unwrap();
    manager.enqueue_socket_event(chat("keynote", "hello")).await.unwrap();

    manager.network().apply(signal(true)).await;
    let report = manager.replay(SyncTrigger::Reconnected).await;
    assert_eq!(report.stopped, Some(StopReason::Transient));
    assert!(emitter.emitted().is_empty());

    manager.replay(SyncTrigger::Reconnected).await;
    assert_eq!(emitter.emitted().len(), 1);
    assert_eq!(manager.pending_actions().await, 0);
}

#[tokio::test]
async fn test_transient_emit_failure_keeps_the_event() {
    let emitter = Arc::new(RecordingEmitter::new());
    emitter.script(vec![Err(SyncError::transient("socket closed"))]);
    let manager = manager_with(Arc::new(MockBackend::new()), true, SyncPolicy::default())
        .await
        .with_emitter(emitter.clone());
    manager.enqueue_socket_event(chat("keynote", "hello")).await.unwrap();
    manager.enqueue_socket_event(chat("keynote", "again")).await.unwrap();

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.completed, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(manager.pending_actions().await, 2);

    manager.replay(SyncTrigger::Manual).await;
    let texts: Vec<_> = emitter
        .emitted()
        .iter()
        .map(|(_, payload)| payload["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["hello", "again"]);
}

#[tokio::test]
async fn test_refused_event_is_dropped_and_announced() {
    let emitter = Arc::new(RecordingEmitter::new());
    emitter.script(vec![Err(SyncError::rejected(None, "session has ended"))]);
    let manager = manager_with(Arc::new(MockBackend::new()), true, SyncPolicy::default())
        .await
        .with_emitter(emitter.clone());
    let log = EventLog::attach(&manager).await;
    manager.enqueue_socket_event(chat("keynote", "late")).await.unwrap();

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.failed, 1);
    assert_eq!(manager.pending_actions().await, 0);

    let failed = log
        .events()
        .into_iter()
        .find(|e| e.event_type == SyncEventType::MutationFailed)
        .and_then(|e| e.mutation)
        .unwrap();
    assert_eq!(failed.operation_name, "chat:send");
    assert_eq!(failed.attempt_count, 1);
}

#[tokio::test]
async fn test_refused_event_does_not_hold_back_its_channel() {
    let emitter = Arc::new(RecordingEmitter::new());
    emitter.script(vec![Err(SyncError::rejected(None, "message too long")), Ok(())]);
    let manager = manager_with(Arc::new(MockBackend::new()), true, SyncPolicy::default())
        .await
        .with_emitter(emitter.clone());
    let log = EventLog::attach(&manager).await;
    manager.enqueue_socket_event(chat("keynote", "refused")).await.unwrap();
    manager.enqueue_socket_event(chat("keynote", "accepted")).await.unwrap();

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(emitter.emitted().len(), 1);
    assert_eq!(emitter.emitted()[0].0, "chat:send");
    assert_eq!(manager.pending_actions().await, 0);
    assert_eq!(
        log.events()
            .iter()
            .filter(|e| e.event_type == SyncEventType::MutationFailed)
            .count(),
        1
    );

    // nothing is left to retry or discard
    let report = manager.replay(SyncTrigger::Manual).await;
    assert!(!report.ran);
}

#[tokio::test]
async fn test_channel_emitter_waits_for_the_socket_ack() {
    let (emitter, mut outbound) = ChannelEmitter::channel(8);
    let socket = tokio::spawn(async move {
        let mut names = Vec::new();
        while let Some(event) = outbound.recv().await {
            names.push(event.event_name.clone());
            event.ack(Ok(()));
        }
        names
    });

    let manager = manager_with(Arc::new(MockBackend::new()), true, SyncPolicy::default())
        .await
        .with_emitter(Arc::new(emitter));
    manager
        .enqueue_socket_event(SocketEventKind::React {
            session_id: "keynote".to_string(),
            emoji: "🎉".to_string(),
        })
        .await
        .unwrap();

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.completed, 1);

    drop(manager);
    assert_eq!(socket.await.unwrap(), vec!["reaction:send"]);
}
