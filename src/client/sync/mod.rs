//! # Sync Manager
//!
//! Replays writes queued while offline, strictly in the order they were
//! made, once connectivity returns.
//!
//! ## Architecture
//!
//! The sync layer coordinates:
//! - **Mutation Queue**: durable FIFO of GraphQL writes (`offline::queue`)
//! - **Socket Event Queue**: per-channel real-time emissions
//! - **Network Monitor**: connectivity detection and reconnect edges
//! - **Token Refresh Coordinator**: a valid bearer token for every replayed item
//! - **Scheduler**: how often scheduled passes run for the current network
//! - **Background Worker**: single consumer that serializes every pass
//!
//! ## Replay Pass
//!
//! A pass walks the queue front to back. Each item goes `IN_FLIGHT`, is sent
//! with its idempotency key and a bounded timeout, and then:
//!
//! - **confirmed**: removed from the queue
//! - **transient failure**: back to `PENDING` with backoff; the pass stops
//! - **rejected**: `FAILED_TERMINAL`, announced with `mutation_failed`
//! - **auth expired**: left `PENDING`; the pass stops
//!
//! Every pass that does work is bracketed by one `sync_start` and one
//! `sync_complete` event.
//!
//! ## Real-Time Events
//!
//! Socket events replay after the mutation queue, oldest first within each
//! channel. They do not keep a `FAILED_TERMINAL` state. A chat line or a
//! question only means something to the live session it was sent into, and
//! there is no later replay in which a refused one could succeed. So an
//! event the socket refuses, or one that runs out of attempts, is removed
//! and announced with `mutation_failed` carrying its event name. The UI
//! gets the failure to show, and newer events on the same channel are not
//! held back behind it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eventsync::client::local_db::LocalStore;
//! use eventsync::client::sync::{SyncManager, SyncTrigger};
//! use eventsync::client::sync::network_monitor::{ConnectivitySignal, NetworkMonitor};
//! use eventsync::client::transport::HttpTransport;
//! use eventsync::client::Config;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let store = LocalStore::open(config.db_path()).await;
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let network = NetworkMonitor::new(ConnectivitySignal::online());
//!
//! let manager = SyncManager::new(store, transport, network, config.app().sync.clone()).await;
//! manager.on_sync_event(|event| println!("{:?}", event.event_type)).await;
//!
//! let report = manager.replay(SyncTrigger::Manual).await;
//! println!("confirmed {} queued writes", report.completed);
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod metrics;
pub mod network_monitor;
pub mod scheduler;
pub mod sync_state;

pub use background::{SyncCommand, SyncWorker};
pub use metrics::SyncMetrics;
pub use network_monitor::{ConnectionQuality, ConnectivitySignal, NetworkMonitor, NetworkStatus};
pub use scheduler::SyncScheduler;
pub use sync_state::SyncState;

use crate::client::auth::TokenRefreshCoordinator;
use crate::client::local_db::LocalStore;
use crate::client::offline::{
    FailureDisposition, MutationQueue, MutationStatus, QueuedMutation, QueuedSocketEvent, RetryPolicy,
    SocketEventQueue,
};
use crate::client::transport::{EventEmitter, MutationTransport};
use crate::shared::config::{SyncPolicy, TerminalFailurePolicy};
use crate::shared::error::SyncError;
use crate::shared::event::{FailedMutation, SyncEvent};
use crate::shared::operation::{MutationKind, SocketEventKind};
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

/// What started a replay pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Offline→online edge; backoff is ignored
    Reconnected,
    /// Periodic retry; items still backing off are not sent
    Scheduled,
    /// Explicit request from the app
    Manual,
}

/// Why a pass stopped before the end of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A send failed transiently; later items wait for the next pass
    Transient,
    /// The session is no longer valid
    AuthExpired,
    /// A terminal item at the head blocks the queue
    Blocked,
    /// The head item is still backing off
    BackingOff,
}

/// Result of one replay pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub trigger: SyncTrigger,
    /// Whether the pass ran at all (offline or nothing due ⇒ `false`)
    pub ran: bool,
    pub completed: usize,
    pub failed: usize,
    /// Pending actions left after the pass
    pub pending: usize,
    pub stopped: Option<StopReason>,
}

impl ReplayReport {
    fn idle(trigger: SyncTrigger, pending: usize) -> Self {
        Self {
            trigger,
            ran: false,
            completed: 0,
            failed: 0,
            pending,
            stopped: None,
        }
    }
}

/// Result of [`SyncManager::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Confirmed by the backend right away
    Sent { data: Value },
    /// Queued for replay; `durable` is false when storage is unavailable
    Queued { mutation: QueuedMutation, durable: bool },
    /// Refused by the backend; nothing was queued
    Rejected { error: SyncError },
}

/// Handle returned by [`SyncManager::on_sync_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type SyncListener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Coordinates queued writes with the backend
pub struct SyncManager {
    store: LocalStore,
    mutations: MutationQueue,
    socket_events: SocketEventQueue,
    transport: Arc<dyn MutationTransport>,
    emitter: Option<Arc<dyn EventEmitter>>,
    auth: Option<Arc<TokenRefreshCoordinator>>,
    network: NetworkMonitor,
    policy: SyncPolicy,
    // one pass at a time
    replay_lock: Mutex<()>,
    state: RwLock<SyncState>,
    metrics: RwLock<SyncMetrics>,
    listeners: RwLock<Vec<(ListenerId, SyncListener)>>,
    next_listener: AtomicU64,
    events: broadcast::Sender<SyncEvent>,
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("store", &self.store)
            .field("network", &self.network)
            .field("policy", &self.policy)
            .field("has_emitter", &self.emitter.is_some())
            .field("has_auth", &self.auth.is_some())
            .finish()
    }
}

impl SyncManager {
    /// Build a manager over `store` and recover state left by a previous run
    pub async fn new(
        store: LocalStore,
        transport: Arc<dyn MutationTransport>,
        network: NetworkMonitor,
        policy: SyncPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let manager = Self {
            mutations: MutationQueue::new(store.clone(), RetryPolicy::from(&policy)),
            socket_events: SocketEventQueue::new(store.clone()),
            store,
            transport,
            emitter: None,
            auth: None,
            network,
            policy,
            replay_lock: Mutex::new(()),
            state: RwLock::new(SyncState::default()),
            metrics: RwLock::new(SyncMetrics::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            events,
        };

        manager.mutations.recover().await;
        manager.state.write().await.last_sync = manager.store.last_sync_time().await;
        manager.refresh_state().await;
        manager
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn with_auth(mut self, auth: Arc<TokenRefreshCoordinator>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Perform a write now if possible, otherwise queue it.
    ///
    /// Writes are queued instead of sent while older writes are still
    /// queued, so the backend sees them in the order they were made.
    pub async fn submit(&self, operation: MutationKind) -> Result<SubmitOutcome, SyncError> {
        operation.validate()?;

        if !self.network.is_online().await || self.mutations.count_pending().await > 0 {
            return self.queue(operation).await;
        }

        let mutation = QueuedMutation::new(operation);
        let result = match self.token().await {
            Ok(token) => self.send(&mutation, token.as_deref()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(data) => Ok(SubmitOutcome::Sent { data }),
            Err(e) if e.is_retryable() || e.is_auth() => {
                tracing::info!("{} not sent ({}); queued for replay", mutation.operation_name(), e);
                // same idempotency key, in case the backend did apply it
                let mutation = self.mutations.enqueue_item(mutation).await?;
                self.refresh_state().await;
                Ok(SubmitOutcome::Queued {
                    mutation,
                    durable: self.mutations.is_durable(),
                })
            }
            Err(error) => {
                tracing::warn!("{} rejected: {}", mutation.operation_name(), error);
                Ok(SubmitOutcome::Rejected { error })
            }
        }
    }

    async fn queue(&self, operation: MutationKind) -> Result<SubmitOutcome, SyncError> {
        let mutation = self.enqueue(operation).await?;
        Ok(SubmitOutcome::Queued {
            mutation,
            durable: self.mutations.is_durable(),
        })
    }

    /// Queue a write for replay
    pub async fn enqueue(&self, operation: MutationKind) -> Result<QueuedMutation, SyncError> {
        let mutation = self.mutations.enqueue(operation).await?;
        self.refresh_state().await;
        Ok(mutation)
    }

    /// Queue a real-time emission for replay
    pub async fn enqueue_socket_event(&self, event: SocketEventKind) -> Result<QueuedSocketEvent, SyncError> {
        let queued = self.socket_events.enqueue(event).await?;
        self.refresh_state().await;
        Ok(queued)
    }

    /// Run one replay pass
    pub async fn replay(&self, trigger: SyncTrigger) -> ReplayReport {
        let _pass = self.replay_lock.lock().await;

        if !self.network.is_online().await {
            tracing::debug!("Skipping {:?} replay while offline", trigger);
            return ReplayReport::idle(trigger, self.pending_actions().await);
        }

        let items = self.mutations.items().await;
        let socket_pending = self.socket_events.count().await;
        if !self.has_due_work(&items, trigger, socket_pending) {
            return ReplayReport::idle(trigger, items.len() + socket_pending);
        }

        let pending = items.len() + socket_pending;
        tracing::info!("Replay ({:?}) started with {} pending actions", trigger, pending);
        self.state.write().await.is_syncing = true;
        self.metrics.write().await.record_pass_start();
        self.publish(SyncEvent::sync_start(pending)).await;

        let mut report = ReplayReport {
            trigger,
            ran: true,
            completed: 0,
            failed: 0,
            pending,
            stopped: None,
        };

        self.replay_mutations(items, &mut report).await;
        if !matches!(report.stopped, Some(StopReason::Transient | StopReason::AuthExpired)) {
            self.replay_socket_events(&mut report).await;
        }

        report.pending = self.pending_actions().await;
        self.store.set_last_sync_time().await;
        self.metrics.write().await.record_pass_end(report.completed, report.failed);
        {
            let mut state = self.state.write().await;
            state.is_syncing = false;
            state.current = None;
            state.last_sync = Some(Utc::now());
        }
        self.refresh_state().await;

        tracing::info!(
            "Replay ({:?}) finished: {} confirmed, {} failed, {} pending",
            trigger,
            report.completed,
            report.failed,
            report.pending
        );
        self.publish(SyncEvent::sync_complete(report.completed, report.pending, report.failed))
            .await;
        report
    }

    fn has_due_work(&self, items: &[QueuedMutation], trigger: SyncTrigger, socket_pending: usize) -> bool {
        if socket_pending > 0 {
            return true;
        }
        let now = Utc::now();
        for item in items {
            if item.status == MutationStatus::FailedTerminal {
                match self.policy.terminal_failure {
                    TerminalFailurePolicy::Block => return false,
                    TerminalFailurePolicy::Skip => continue,
                }
            }
            return trigger != SyncTrigger::Scheduled || !item.is_backing_off(now);
        }
        false
    }

    async fn replay_mutations(&self, items: Vec<QueuedMutation>, report: &mut ReplayReport) {
        let now = Utc::now();

        for mut item in items {
            if item.status == MutationStatus::FailedTerminal {
                match self.policy.terminal_failure {
                    TerminalFailurePolicy::Block => {
                        tracing::debug!("Queue blocked by failed {} ({})", item.operation_name(), item.id);
                        report.stopped = Some(StopReason::Blocked);
                        return;
                    }
                    TerminalFailurePolicy::Skip => continue,
                }
            }

            if report.trigger == SyncTrigger::Scheduled && item.is_backing_off(now) {
                report.stopped = Some(StopReason::BackingOff);
                return;
            }

            let token = match self.token().await {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!("Replay paused, no valid session: {}", e);
                    self.state.write().await.last_error = Some(e.to_string());
                    report.stopped = Some(StopReason::AuthExpired);
                    return;
                }
            };

            self.state.write().await.current = Some(item.id);
            self.mutations.mark_in_flight(&mut item).await;

            match self.send(&item, token.as_deref()).await {
                Ok(_) => {
                    tracing::debug!("Confirmed {} ({})", item.operation_name(), item.id);
                    self.mutations.confirm(&item.id).await;
                    report.completed += 1;
                }
                Err(e) if e.is_auth() => {
                    tracing::warn!("Session rejected while replaying {}: {}", item.operation_name(), e);
                    self.mutations.release(&mut item).await;
                    if let Some(auth) = &self.auth {
                        // a failed refresh ends the session
                        if let Err(refresh_err) = auth.refresh().await {
                            tracing::warn!("Token refresh after rejection failed: {}", refresh_err);
                        }
                    }
                    self.state.write().await.last_error = Some(e.to_string());
                    report.stopped = Some(StopReason::AuthExpired);
                    return;
                }
                Err(e) => match self.mutations.record_failure(&mut item, &e).await {
                    FailureDisposition::Retry { next_attempt_at } => {
                        tracing::warn!(
                            "{} failed (attempt {}), retrying after {}: {}",
                            item.operation_name(),
                            item.attempt_count,
                            next_attempt_at,
                            e
                        );
                        self.state.write().await.last_error = Some(e.to_string());
                        report.stopped = Some(StopReason::Transient);
                        return;
                    }
                    FailureDisposition::Terminal => {
                        tracing::error!(
                            "{} failed permanently after {} attempts: {}",
                            item.operation_name(),
                            item.attempt_count,
                            e
                        );
                        report.failed += 1;
                        self.publish(SyncEvent::mutation_failed(FailedMutation {
                            id: item.id,
                            operation_name: item.operation_name().to_string(),
                            error: e.to_string(),
                            attempt_count: item.attempt_count,
                        }))
                        .await;

                        if self.policy.terminal_failure == TerminalFailurePolicy::Block {
                            report.stopped = Some(StopReason::Blocked);
                            return;
                        }
                    }
                },
            }
        }
    }

    async fn replay_socket_events(&self, report: &mut ReplayReport) {
        let Some(emitter) = &self.emitter else {
            return;
        };

        for (channel, events) in self.socket_events.channels().await {
            for event in events {
                self.state.write().await.current = Some(event.id);
                let result = match tokio::time::timeout(
                    self.policy.request_timeout(),
                    emitter.emit(event.event_name(), event.payload()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::timeout(self.policy.request_timeout())),
                };

                match result {
                    Ok(()) => {
                        self.socket_events.remove(&channel, &event.id).await;
                        report.completed += 1;
                    }
                    Err(e) if e.is_retryable() && event.attempt_count + 1 < self.policy.max_attempts => {
                        tracing::warn!("{} on {} failed, keeping it queued: {}", event.event_name(), channel, e);
                        self.socket_events.record_failure(&channel, &event.id, &e).await;
                        // the socket is down for every channel
                        return;
                    }
                    // refused events are announced and removed, never parked
                    Err(e) => {
                        tracing::error!("Dropping {} on {}: {}", event.event_name(), channel, e);
                        self.socket_events.remove(&channel, &event.id).await;
                        report.failed += 1;
                        self.publish(SyncEvent::mutation_failed(FailedMutation {
                            id: event.id,
                            operation_name: event.event_name().to_string(),
                            error: e.to_string(),
                            attempt_count: event.attempt_count + 1,
                        }))
                        .await;
                    }
                }
            }
        }
    }

    async fn token(&self) -> Result<Option<String>, SyncError> {
        match &self.auth {
            Some(auth) => auth.valid_token().await.map(Some),
            None => Ok(None),
        }
    }

    async fn send(&self, mutation: &QueuedMutation, token: Option<&str>) -> Result<Value, SyncError> {
        let timeout = self.policy.request_timeout();
        match tokio::time::timeout(timeout, self.transport.send_mutation(mutation, token)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout(timeout)),
        }
    }

    /// Register a callback for sync events
    pub async fn on_sync_event<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().await.push((id, Arc::new(listener)));
        id
    }

    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().await;
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Channel form of [`on_sync_event`](Self::on_sync_event)
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    async fn publish(&self, event: SyncEvent) {
        tracing::debug!("Sync event: {:?}", event.event_type);
        for (_, listener) in self.listeners.read().await.iter() {
            listener(&event);
        }
        let _ = self.events.send(event);
    }

    /// User decision: give a failed write another round of attempts
    pub async fn retry_failed(&self, id: &Uuid) -> bool {
        let retried = self.mutations.retry(id).await.is_some();
        if retried {
            tracing::info!("Failed mutation {} queued for retry", id);
            self.refresh_state().await;
        }
        retried
    }

    /// User decision: drop a failed write
    pub async fn discard_failed(&self, id: &Uuid) -> bool {
        let discarded = self.mutations.discard(id).await;
        if discarded {
            self.refresh_state().await;
        }
        discarded
    }

    /// Drop every queued action without replaying it.
    ///
    /// Destructive; callers must confirm with the user first.
    pub async fn clear(&self) -> usize {
        let _pass = self.replay_lock.lock().await;
        let dropped = self.mutations.clear().await + self.socket_events.clear().await;
        tracing::warn!("Cleared {} queued actions without replay", dropped);
        self.refresh_state().await;
        dropped
    }

    /// Queued mutations plus queued socket events
    pub async fn pending_actions(&self) -> usize {
        self.mutations.count_pending().await + self.socket_events.count().await
    }

    pub async fn queued(&self) -> Vec<QueuedMutation> {
        self.mutations.items().await
    }

    /// Writes waiting for a user decision
    pub async fn failed(&self) -> Vec<QueuedMutation> {
        self.mutations.failed().await
    }

    pub async fn status(&self) -> SyncState {
        self.state.read().await.clone()
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.read().await.clone()
    }

    /// Re-derive the status snapshot from the store
    pub async fn refresh_state(&self) {
        let pending_actions = self.pending_actions().await;
        let failed_operations = self.mutations.failed().await.len();
        let network_status = self.network.current().await;

        let mut state = self.state.write().await;
        state.pending_actions = pending_actions;
        state.failed_operations = failed_operations;
        state.network_status = network_status;
    }

    /// Start the background worker
    pub fn spawn(self: Arc<Self>) -> SyncWorker {
        SyncWorker::spawn(self)
    }
}
