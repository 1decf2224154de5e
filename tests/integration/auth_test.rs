//! Token refresh against a mock auth endpoint

use crate::common::*;
use crate::recv_within;
use eventsync::client::auth::{AuthEvent, AuthPhase, TokenRefreshCoordinator};
use eventsync::client::sync::{StopReason, SyncTrigger};
use eventsync::client::{Config, HttpTransport};
use eventsync::shared::{AppConfig, AuthPolicy, SyncError, SyncPolicy};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn coordinator(server: &MockServer) -> Arc<TokenRefreshCoordinator> {
    let config = Config::with_builder(AppConfig::builder().server_url(server.uri())).unwrap();
    let transport = Arc::new(HttpTransport::new(&config).unwrap());
    Arc::new(TokenRefreshCoordinator::new(
        transport,
        AuthPolicy::default(),
        config.login_redirect(),
    ))
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    let fresh = fresh_token();
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(refresh_body(&fresh))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(token_expiring_in(60), None).await;

    let callers = (0..5).map(|_| {
        let auth = auth.clone();
        async move { auth.valid_token().await }
    });
    let tokens = join_all(callers).await;

    for token in tokens {
        assert_eq!(token.unwrap(), fresh);
    }
    assert_eq!(auth.phase().await, AuthPhase::Valid);
    assert_eq!(auth.current_user().await.unwrap().id, "user_1");
}

#[tokio::test]
async fn test_bearer_token_is_sent_to_refresh() {
    let server = MockServer::start().await;
    let old = token_expiring_in(60);
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", format!("Bearer {}", old).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(&fresh_token())))
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(old, None).await;
    let mut events = auth.subscribe();

    assert!(auth.refresh().await.is_ok());
    assert!(matches!(recv_within!(events), AuthEvent::Refreshed { .. }));
}

#[tokio::test]
async fn test_expired_token_and_rejected_refresh_logs_out_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(expired_token(), None).await;
    let mut events = auth.subscribe();

    let callers = (0..3).map(|_| {
        let auth = auth.clone();
        async move { auth.valid_token().await }
    });
    for result in join_all(callers).await {
        assert!(result.unwrap_err().is_auth());
    }

    match recv_within!(events) {
        AuthEvent::LoggedOut { redirect_to } => assert_eq!(redirect_to, "/auth/login"),
        other => panic!("Expected LoggedOut, got {:?}", other),
    }
    assert!(events.try_recv().is_err());
    assert_eq!(auth.phase().await, AuthPhase::LoggedOut);
}

#[tokio::test]
async fn test_unreachable_refresh_endpoint_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(token_expiring_in(120), None).await;
    let mut events = auth.subscribe();

    let err = auth.refresh().await.unwrap_err();
    assert!(err.is_auth());

    match recv_within!(events) {
        AuthEvent::LoggedOut { redirect_to } => assert_eq!(redirect_to, "/auth/login"),
        other => panic!("Expected LoggedOut, got {:?}", other),
    }
    assert_eq!(auth.phase().await, AuthPhase::LoggedOut);
}

#[tokio::test]
async fn test_refresh_callback_receives_token_and_user() {
    let server = MockServer::start().await;
    let refreshed = token_expiring_in(7200);
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(&refreshed)))
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(token_expiring_in(60), None).await;

    let mut received = None;
    auth.refresh_with(
        |token, user| received = Some((token.to_string(), user.clone())),
        |e| panic!("Expected refresh to succeed, got {:?}", e),
    )
    .await;

    let (token, user) = received.unwrap();
    assert_eq!(token, refreshed);
    assert_eq!(user.id, "user_1");
    assert_eq!(user.email.as_deref(), Some("attendee@example.com"));
    assert_eq!(auth.current_user().await, Some(user));
}

#[tokio::test]
async fn test_replay_pauses_until_a_session_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(expired_token(), None).await;

    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(backend.clone(), true, SyncPolicy::default())
        .await
        .with_auth(auth.clone());
    manager.enqueue(vote("a")).await.unwrap();

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.stopped, Some(StopReason::AuthExpired));
    assert_eq!(backend.calls(), 0);
    assert_eq!(manager.pending_actions().await, 1);

    auth.set_session(fresh_token(), None).await;
    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.completed, 1);
    assert!(backend.tokens()[0].is_some());
}

#[tokio::test]
async fn test_backend_rejecting_the_session_triggers_refresh() {
    let server = MockServer::start().await;
    let refreshed = token_expiring_in(7200);
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(refresh_body(&refreshed)))
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(fresh_token(), None).await;

    let backend = Arc::new(MockBackend::with_script(vec![MockReply::Fail(SyncError::auth_expired(
        "session revoked",
    ))]));
    let manager = manager_with(backend.clone(), true, SyncPolicy::default())
        .await
        .with_auth(auth.clone());
    let queued = manager.enqueue(vote("a")).await.unwrap();

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.stopped, Some(StopReason::AuthExpired));
    let item = manager.queued().await.remove(0);
    assert_eq!(item.id, queued.id);
    assert_eq!(item.attempt_count, 0);

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.completed, 1);
    assert_eq!(backend.tokens().last().cloned().flatten(), Some(refreshed));
}

#[tokio::test]
async fn test_failed_refresh_after_rejection_stops_replay_and_logs_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&server)
        .await;

    let auth = coordinator(&server);
    auth.set_session(fresh_token(), None).await;
    let mut events = auth.subscribe();

    let backend = Arc::new(MockBackend::with_script(vec![MockReply::Fail(SyncError::auth_expired(
        "session revoked",
    ))]));
    let manager = manager_with(backend.clone(), true, SyncPolicy::default())
        .await
        .with_auth(auth.clone());
    manager.enqueue(vote("a")).await.unwrap();

    let report = manager.replay(SyncTrigger::Manual).await;
    assert_eq!(report.stopped, Some(StopReason::AuthExpired));
    assert!(matches!(recv_within!(events), AuthEvent::LoggedOut { .. }));
    assert_eq!(auth.phase().await, AuthPhase::LoggedOut);
    assert_eq!(manager.pending_actions().await, 1);
}
