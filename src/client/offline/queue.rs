//! # Operation Queue
//!
//! Persistent FIFO queues of writes that have not been confirmed by the
//! backend yet.
//!
//! ## Features
//!
//! - **Persistent Queue**: Items live in the local store and survive restarts
//! - **Idempotency Keys**: Every item carries a key that is re-sent on every replay
//! - **Status Tracking**: `PENDING → IN_FLIGHT → {CONFIRMED | FAILED_RETRYABLE → PENDING | FAILED_TERMINAL}`
//! - **Recovery**: Items left `IN_FLIGHT` by a crash go back to `PENDING`
//! - **User Decisions**: Terminal failures stay queued until retried or discarded
//!
//! Mutations are stored one record per item in `mutationQueue`, keyed by id.
//! Socket events are grouped per channel under `socket_queue_<channel>` in
//! `syncMeta`. When the store is unavailable both queues fall back to memory,
//! so queued writes are still replayed during this run but lost on restart.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eventsync::client::local_db::LocalStore;
//! use eventsync::client::offline::queue::MutationQueue;
//! use eventsync::shared::MutationKind;
//!
//! # async fn example() -> Result<(), eventsync::shared::SyncError> {
//! let queue = MutationQueue::new(LocalStore::in_memory().await, Default::default());
//! queue.enqueue(MutationKind::SubmitPollVote {
//!     poll_id: "poll_1".to_string(),
//!     option_id: "opt_2".to_string(),
//! }).await?;
//!
//! for item in queue.items().await {
//!     // replay item...
//!     queue.confirm(&item.id).await;
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::local_db::sync::{socket_queue_key, SOCKET_QUEUE_PREFIX};
use crate::client::local_db::{LocalStore, StoreName};
use crate::client::offline::retry::RetryPolicy;
use crate::shared::error::SyncError;
use crate::shared::operation::{MutationKind, SocketEventKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Persisted status of a queued mutation
///
/// `CONFIRMED` items are deleted, and `FAILED_RETRYABLE` is immediately
/// folded back into `Pending` with a later `next_attempt_at`, so neither is
/// stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    /// Waiting to be replayed
    Pending,
    /// Currently being sent
    InFlight,
    /// Rejected or out of retries; waiting for a user decision
    FailedTerminal,
}

/// A GraphQL write waiting for confirmation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    pub id: Uuid,
    pub operation: MutationKind,
    pub idempotency_key: Uuid,
    pub enqueued_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub status: MutationStatus,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl QueuedMutation {
    pub fn new(operation: MutationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            idempotency_key: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            attempt_count: 0,
            status: MutationStatus::Pending,
            last_error: None,
            next_attempt_at: None,
        }
    }

    pub fn operation_name(&self) -> &'static str {
        self.operation.operation_name()
    }

    pub fn variables(&self) -> serde_json::Value {
        self.operation.variables(&self.idempotency_key)
    }

    /// Whether backoff still holds this item back at `now`
    pub fn is_backing_off(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.is_some_and(|at| at > now)
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// What happened to an item after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FailureDisposition {
    /// Back to `PENDING`; not retried before the given time by scheduled passes
    Retry { next_attempt_at: DateTime<Utc> },
    /// `FAILED_TERMINAL`; needs a user decision
    Terminal,
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total items in the queue
    pub total: usize,
    /// Items waiting for replay
    pub pending: usize,
    /// Items being sent
    pub in_flight: usize,
    /// Items waiting for a user decision
    pub failed_terminal: usize,
}

/// Durable FIFO of queued mutations
#[derive(Debug, Clone)]
pub struct MutationQueue {
    store: LocalStore,
    policy: RetryPolicy,
    // used only while the store is unavailable
    memory: Arc<Mutex<VecDeque<QueuedMutation>>>,
}

impl MutationQueue {
    pub fn new(store: LocalStore, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            memory: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Whether queued items survive a restart
    pub fn is_durable(&self) -> bool {
        self.store.is_available()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Validate and append an operation
    pub async fn enqueue(&self, operation: MutationKind) -> Result<QueuedMutation, SyncError> {
        self.enqueue_item(QueuedMutation::new(operation)).await
    }

    /// Append an item that already has its id and idempotency key
    pub async fn enqueue_item(&self, mut mutation: QueuedMutation) -> Result<QueuedMutation, SyncError> {
        mutation.operation.validate()?;
        mutation.status = MutationStatus::Pending;
        if !self.save(&mutation).await {
            return Err(SyncError::storage(format!(
                "could not queue {} {}",
                mutation.operation_name(),
                mutation.id
            )));
        }
        if !self.is_durable() {
            tracing::warn!(
                "{} {} queued in memory only",
                mutation.operation_name(),
                mutation.id
            );
        }
        tracing::debug!("Queued {} ({})", mutation.operation_name(), mutation.id);
        Ok(mutation)
    }

    /// All items in enqueue order, read fresh from the store
    pub async fn items(&self) -> Vec<QueuedMutation> {
        if !self.is_durable() {
            return self.memory.lock().await.iter().cloned().collect();
        }
        self.store.get_all_items(StoreName::MutationQueue).await
    }

    pub async fn get(&self, id: &Uuid) -> Option<QueuedMutation> {
        if !self.is_durable() {
            return self.memory.lock().await.iter().find(|m| &m.id == id).cloned();
        }
        self.store.get(StoreName::MutationQueue, &id.to_string()).await
    }

    /// Overwrite an item's record, appending it if it is new
    pub async fn save(&self, mutation: &QueuedMutation) -> bool {
        if !self.is_durable() {
            let mut memory = self.memory.lock().await;
            match memory.iter_mut().find(|m| m.id == mutation.id) {
                Some(existing) => *existing = mutation.clone(),
                None => memory.push_back(mutation.clone()),
            }
            return true;
        }
        self.store.put(StoreName::MutationQueue, &mutation.key(), mutation).await
    }

    /// `PENDING → IN_FLIGHT`
    pub async fn mark_in_flight(&self, mutation: &mut QueuedMutation) -> bool {
        mutation.status = MutationStatus::InFlight;
        self.save(mutation).await
    }

    /// `IN_FLIGHT → CONFIRMED`: the item leaves the queue
    pub async fn confirm(&self, id: &Uuid) -> bool {
        if !self.is_durable() {
            let mut memory = self.memory.lock().await;
            let before = memory.len();
            memory.retain(|m| &m.id != id);
            return memory.len() != before;
        }
        self.store.delete(StoreName::MutationQueue, &id.to_string()).await
    }

    /// Put an item back to `PENDING` without counting an attempt
    pub async fn release(&self, mutation: &mut QueuedMutation) -> bool {
        mutation.status = MutationStatus::Pending;
        self.save(mutation).await
    }

    /// Count a failed attempt and decide between retry and terminal failure
    pub async fn record_failure(
        &self,
        mutation: &mut QueuedMutation,
        error: &SyncError,
    ) -> FailureDisposition {
        mutation.attempt_count += 1;
        mutation.last_error = Some(error.to_string());

        let disposition = if error.is_retryable() && !self.policy.should_give_up(mutation.attempt_count) {
            let next_attempt_at = self
                .policy
                .next_attempt_at(mutation.attempt_count, &mutation.idempotency_key);
            mutation.status = MutationStatus::Pending;
            mutation.next_attempt_at = Some(next_attempt_at);
            FailureDisposition::Retry { next_attempt_at }
        } else {
            mutation.status = MutationStatus::FailedTerminal;
            mutation.next_attempt_at = None;
            FailureDisposition::Terminal
        };

        self.save(mutation).await;
        disposition
    }

    /// User decision: give a terminal item a fresh set of attempts
    pub async fn retry(&self, id: &Uuid) -> Option<QueuedMutation> {
        let mut mutation = self.get(id).await?;
        if mutation.status != MutationStatus::FailedTerminal {
            return None;
        }
        mutation.status = MutationStatus::Pending;
        mutation.attempt_count = 0;
        mutation.last_error = None;
        mutation.next_attempt_at = None;
        self.save(&mutation).await;
        Some(mutation)
    }

    /// User decision: drop a terminal item
    pub async fn discard(&self, id: &Uuid) -> bool {
        match self.get(id).await {
            Some(mutation) if mutation.status == MutationStatus::FailedTerminal => {
                tracing::info!("Discarding failed {} ({})", mutation.operation_name(), id);
                self.confirm(id).await
            }
            _ => false,
        }
    }

    /// Items a crash left `IN_FLIGHT` go back to `PENDING`
    pub async fn recover(&self) -> usize {
        let mut recovered = 0;
        for mut mutation in self.items().await {
            if mutation.status == MutationStatus::InFlight {
                mutation.status = MutationStatus::Pending;
                if self.save(&mutation).await {
                    recovered += 1;
                }
            }
        }
        if recovered > 0 {
            tracing::info!("Recovered {} in-flight mutations", recovered);
        }
        recovered
    }

    /// Items waiting for a user decision
    pub async fn failed(&self) -> Vec<QueuedMutation> {
        self.items()
            .await
            .into_iter()
            .filter(|m| m.status == MutationStatus::FailedTerminal)
            .collect()
    }

    /// Number of mutation-queue entries
    pub async fn count_pending(&self) -> usize {
        if !self.is_durable() {
            return self.memory.lock().await.len();
        }
        self.store.count_pending(StoreName::MutationQueue).await
    }

    pub async fn stats(&self) -> QueueStats {
        let items = self.items().await;
        let mut stats = QueueStats {
            total: items.len(),
            ..QueueStats::default()
        };
        for item in &items {
            match item.status {
                MutationStatus::Pending => stats.pending += 1,
                MutationStatus::InFlight => stats.in_flight += 1,
                MutationStatus::FailedTerminal => stats.failed_terminal += 1,
            }
        }
        stats
    }

    /// Drop every item without replay; returns how many were dropped
    pub async fn clear(&self) -> usize {
        let count = self.count_pending().await;
        if self.is_durable() {
            self.store.clear(StoreName::MutationQueue).await;
        } else {
            self.memory.lock().await.clear();
        }
        count
    }
}

/// A real-time emission waiting for replay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSocketEvent {
    pub id: Uuid,
    pub event: SocketEventKind,
    pub idempotency_key: Uuid,
    pub enqueued_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
}

impl QueuedSocketEvent {
    pub fn new(event: SocketEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            idempotency_key: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            attempt_count: 0,
            last_error: None,
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.event.event_name()
    }

    pub fn payload(&self) -> serde_json::Value {
        self.event.payload(&self.idempotency_key)
    }
}

/// Per-channel queues of socket events
#[derive(Debug)]
pub struct SocketEventQueue {
    store: LocalStore,
    // channel arrays are read-modify-write; also guards the in-memory fallback
    channels: Mutex<Vec<(String, Vec<QueuedSocketEvent>)>>,
}

impl SocketEventQueue {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            channels: Mutex::new(Vec::new()),
        }
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_available()
    }

    pub async fn enqueue(&self, event: SocketEventKind) -> Result<QueuedSocketEvent, SyncError> {
        event.validate()?;
        let queued = QueuedSocketEvent::new(event);
        let channel = queued.event.channel().to_string();

        let pushed = queued.clone();
        if !self.update(&channel, move |items| items.push(pushed)).await {
            return Err(SyncError::storage(format!(
                "could not queue {} {}",
                queued.event_name(),
                queued.id
            )));
        }
        if !self.is_durable() {
            tracing::warn!("{} {} queued in memory only", queued.event_name(), queued.id);
        }
        Ok(queued)
    }

    /// `(channel, events)` for every non-empty channel
    pub async fn channels(&self) -> Vec<(String, Vec<QueuedSocketEvent>)> {
        if !self.is_durable() {
            return self.channels.lock().await.clone();
        }
        self.store
            .get_with_prefix::<Vec<QueuedSocketEvent>>(StoreName::SyncMeta, SOCKET_QUEUE_PREFIX)
            .await
            .into_iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(key, items)| (key[SOCKET_QUEUE_PREFIX.len()..].to_string(), items))
            .collect()
    }

    pub async fn items(&self, channel: &str) -> Vec<QueuedSocketEvent> {
        if !self.is_durable() {
            return self
                .channels
                .lock()
                .await
                .iter()
                .find(|(name, _)| name == channel)
                .map(|(_, items)| items.clone())
                .unwrap_or_default();
        }
        self.store
            .get(StoreName::SyncMeta, &socket_queue_key(channel))
            .await
            .unwrap_or_default()
    }

    /// Remove a confirmed event
    pub async fn remove(&self, channel: &str, id: &Uuid) -> bool {
        self.update(channel, |items| items.retain(|e| &e.id != id)).await
    }

    /// Count a failed emission attempt
    pub async fn record_failure(&self, channel: &str, id: &Uuid, error: &SyncError) -> bool {
        let message = error.to_string();
        self.update(channel, |items| {
            if let Some(event) = items.iter_mut().find(|e| &e.id == id) {
                event.attempt_count += 1;
                event.last_error = Some(message);
            }
        })
        .await
    }

    async fn update(&self, channel: &str, change: impl FnOnce(&mut Vec<QueuedSocketEvent>)) -> bool {
        let mut memory = self.channels.lock().await;

        if !self.is_durable() {
            let position = match memory.iter().position(|(name, _)| name == channel) {
                Some(position) => position,
                None => {
                    memory.push((channel.to_string(), Vec::new()));
                    memory.len() - 1
                }
            };
            change(&mut memory[position].1);
            if memory[position].1.is_empty() {
                memory.remove(position);
            }
            return true;
        }

        let key = socket_queue_key(channel);
        let mut items: Vec<QueuedSocketEvent> = self.store.get(StoreName::SyncMeta, &key).await.unwrap_or_default();
        change(&mut items);
        if items.is_empty() {
            self.store.delete(StoreName::SyncMeta, &key).await
        } else {
            self.store.put(StoreName::SyncMeta, &key, &items).await
        }
    }

    /// Total queued events across channels
    pub async fn count(&self) -> usize {
        self.channels().await.iter().map(|(_, items)| items.len()).sum()
    }

    /// Drop every queued event; returns how many were dropped
    pub async fn clear(&self) -> usize {
        let mut memory = self.channels.lock().await;
        if !self.is_durable() {
            let dropped = memory.iter().map(|(_, items)| items.len()).sum();
            memory.clear();
            return dropped;
        }

        let mut dropped = 0;
        let entries = self
            .store
            .get_with_prefix::<Vec<QueuedSocketEvent>>(StoreName::SyncMeta, SOCKET_QUEUE_PREFIX)
            .await;
        for (key, items) in entries {
            if self.store.delete(StoreName::SyncMeta, &key).await {
                dropped += items.len();
            }
        }
        dropped
    }
}
