//! HTTP transport against a mock GraphQL endpoint

use assert_matches::assert_matches;
use eventsync::client::offline::QueuedMutation;
use eventsync::client::transport::{MutationTransport, IDEMPOTENCY_HEADER};
use eventsync::client::{Config, HttpTransport};
use eventsync::shared::{AppConfig, MutationKind, SyncError, SyncPolicy};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer, policy: SyncPolicy) -> HttpTransport {
    let config = Config::with_builder(AppConfig::builder().server_url(server.uri()).sync_policy(policy)).unwrap();
    HttpTransport::new(&config).unwrap()
}

fn registration() -> QueuedMutation {
    QueuedMutation::new(MutationKind::RegisterForEvent {
        event_id: "evt_1".to_string(),
        ticket_tier_id: "tier_general".to_string(),
        quantity: 2,
    })
}

#[tokio::test]
async fn test_mutation_carries_key_token_and_variables() {
    let server = MockServer::start().await;
    let mutation = registration();
    let key = mutation.idempotency_key.to_string();

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header(IDEMPOTENCY_HEADER, key.as_str()))
        .and(header("authorization", "Bearer token-123"))
        .and(body_partial_json(json!({
            "operationName": "RegisterForEvent",
            "variables": { "eventId": "evt_1", "quantity": 2, "idempotencyKey": key },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "registerForEvent": { "id": "reg_1", "status": "CONFIRMED" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = transport(&server, SyncPolicy::default())
        .send_mutation(&mutation, Some("token-123"))
        .await
        .unwrap();
    assert_eq!(data["registerForEvent"]["id"], "reg_1");
}

#[tokio::test]
async fn test_no_token_means_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .mount(&server)
        .await;

    let result = transport(&server, SyncPolicy::default())
        .send_mutation(&registration(), None)
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let cases = [
        (500, "retryable"),
        (503, "retryable"),
        (429, "retryable"),
        (401, "auth"),
        (422, "rejected"),
        (409, "rejected"),
    ];

    for (status, kind) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&server)
            .await;

        let error = transport(&server, SyncPolicy::default())
            .send_mutation(&registration(), Some("t"))
            .await
            .unwrap_err();

        match kind {
            "retryable" => assert!(error.is_retryable(), "{} should be retryable: {:?}", status, error),
            "auth" => assert!(error.is_auth(), "{} should end the session: {:?}", status, error),
            _ => assert!(
                matches!(error, SyncError::ServerRejected { status: Some(s), .. } if s == status),
                "{} should be a rejection: {:?}",
                status,
                error
            ),
        }
    }
}

#[tokio::test]
async fn test_graphql_errors_in_a_200_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Ticket tier sold out" }]
        })))
        .mount(&server)
        .await;

    let error = transport(&server, SyncPolicy::default())
        .send_mutation(&registration(), Some("t"))
        .await
        .unwrap_err();
    assert_eq!(error, SyncError::rejected(None, "Ticket tier sold out"));
}

#[tokio::test]
async fn test_unauthenticated_graphql_error_is_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Session expired", "extensions": { "code": "UNAUTHENTICATED" } }]
        })))
        .mount(&server)
        .await;

    let error = transport(&server, SyncPolicy::default())
        .send_mutation(&registration(), Some("t"))
        .await
        .unwrap_err();
    assert!(error.is_auth());
}

#[tokio::test]
async fn test_slow_server_times_out_as_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": {} }))
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let policy = SyncPolicy {
        request_timeout_ms: 100,
        ..SyncPolicy::default()
    };
    let error = transport(&server, policy)
        .send_mutation(&registration(), Some("t"))
        .await
        .unwrap_err();
    assert_matches!(&error, SyncError::Timeout { .. });
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_unreachable_backend_is_transient() {
    let config = Config::with_builder(AppConfig::builder().server_url("http://127.0.0.1:9")).unwrap();
    let error = HttpTransport::new(&config)
        .unwrap()
        .send_mutation(&registration(), None)
        .await
        .unwrap_err();
    assert!(error.is_retryable(), "{:?}", error);
}
