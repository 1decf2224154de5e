/**
 * Transport Module
 *
 * The seams between the resilience layer and the network: GraphQL mutation
 * replay, real-time socket emissions and the token refresh endpoint. The
 * sync manager and the auth coordinator only see the traits, so tests
 * can swap in scripted backends.
 */

use crate::client::config::Config;
use crate::client::offline::QueuedMutation;
use crate::client::types::{GraphQLRequest, GraphQLResponse, RefreshResponse};
use crate::shared::error::SyncError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Header carrying the idempotency key next to the GraphQL variable
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Error code a GraphQL server uses for an invalid session
const UNAUTHENTICATED: &str = "UNAUTHENTICATED";

/// Sends queued GraphQL mutations to the backend
#[async_trait]
pub trait MutationTransport: Send + Sync {
    /// Send one mutation; `Ok` carries the GraphQL `data` payload
    async fn send_mutation(&self, mutation: &QueuedMutation, token: Option<&str>) -> Result<Value, SyncError>;
}

/// Emits real-time events over the socket connection
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event_name: &str, payload: Value) -> Result<(), SyncError>;
}

/// Exchanges the current token for a fresh one
#[async_trait]
pub trait RefreshClient: Send + Sync {
    async fn refresh(&self, token: &str) -> Result<RefreshResponse, SyncError>;
}

/// HTTP transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    graphql_url: String,
    refresh_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(config.app().sync.request_timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            graphql_url: config.graphql_url(),
            refresh_url: config.refresh_url(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl MutationTransport for HttpTransport {
    async fn send_mutation(&self, mutation: &QueuedMutation, token: Option<&str>) -> Result<Value, SyncError> {
        let body = GraphQLRequest {
            query: mutation.operation.document(),
            operation_name: mutation.operation_name(),
            variables: mutation.variables(),
        };

        let mut request = self
            .client
            .post(&self.graphql_url)
            .header(IDEMPOTENCY_HEADER, mutation.idempotency_key.to_string())
            .json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(SyncError::from_status(status.as_u16(), error_text));
        }

        let body: GraphQLResponse = response.json().await?;
        classify_graphql(body)
    }
}

#[async_trait]
impl RefreshClient for HttpTransport {
    async fn refresh(&self, token: &str) -> Result<RefreshResponse, SyncError> {
        let response = self
            .client
            .post(&self.refresh_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(SyncError::from_status(status.as_u16(), error_text));
        }

        Ok(response.json().await?)
    }
}

/// Map a GraphQL body onto success or the error taxonomy
pub fn classify_graphql(body: GraphQLResponse) -> Result<Value, SyncError> {
    if body.errors.is_empty() {
        return Ok(body.data.unwrap_or(Value::Null));
    }

    let message = body
        .errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    if body.errors.iter().any(|e| e.code() == Some(UNAUTHENTICATED)) {
        Err(SyncError::auth_expired(message))
    } else {
        Err(SyncError::rejected(None, message))
    }
}

/// A socket emission handed to the app's socket task
///
/// The task must call [`OutboundSocketEvent::ack`] once the server has
/// acknowledged (or refused) the event.
#[derive(Debug)]
pub struct OutboundSocketEvent {
    pub event_name: String,
    pub payload: Value,
    ack: oneshot::Sender<Result<(), SyncError>>,
}

impl OutboundSocketEvent {
    pub fn ack(self, result: Result<(), SyncError>) {
        // the emitter may have timed out already
        let _ = self.ack.send(result);
    }
}

/// [`EventEmitter`] that forwards events to a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::Sender<OutboundSocketEvent>,
}

impl ChannelEmitter {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundSocketEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventEmitter for ChannelEmitter {
    async fn emit(&self, event_name: &str, payload: Value) -> Result<(), SyncError> {
        let (ack, acked) = oneshot::channel();
        let event = OutboundSocketEvent {
            event_name: event_name.to_string(),
            payload,
            ack,
        };

        self.sender
            .send(event)
            .await
            .map_err(|_| SyncError::transient("socket task is not running"))?;

        acked
            .await
            .map_err(|_| SyncError::transient("socket closed before acknowledging"))?
    }
}
