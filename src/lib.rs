//! eventsync - Offline Resilience Layer
//!
//! Client-side plumbing that lets an event-management app keep working
//! while the network comes and goes: registrations, poll votes, lead
//! captures and check-ins made offline are queued durably and replayed to
//! the backend, in order and exactly once, when connectivity returns.
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types
//!   - Error taxonomy, configuration
//!   - Operation kinds that may be queued
//!   - Sync lifecycle events consumed by the UI
//!
//! - **`client`** - The resilience layer
//!   - Local persistence store (SQLite)
//!   - Mutation queue with idempotency keys and retry policy
//!   - Network status observer
//!   - Sync manager and background worker
//!   - Token refresh coordinator
//!
//! # Usage
//!
//! ```rust,no_run
//! use eventsync::client::{Config, HttpTransport, LocalStore, SyncManager};
//! use eventsync::client::sync::{ConnectivitySignal, NetworkMonitor};
//! use eventsync::shared::MutationKind;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let store = LocalStore::open(config.db_path()).await;
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let network = NetworkMonitor::new(ConnectivitySignal::offline());
//! let manager = Arc::new(SyncManager::new(store, transport, network, config.app().sync.clone()).await);
//!
//! manager.submit(MutationKind::CheckInAttendee {
//!     event_id: "evt_1".to_string(),
//!     attendee_id: "att_7".to_string(),
//! }).await?;
//!
//! let worker = manager.clone().spawn();
//! manager.network().apply(ConnectivitySignal::online()).await;
//! # worker.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::error::SyncError` classifies every failure (transient, rejected, auth, ...)
//! - Local storage failures never surface as errors; the store degrades to no-ops
//! - `shared::config::ConfigError` for configuration problems

/// Shared types and data structures
pub mod shared;

/// Offline resilience layer
pub mod client;
