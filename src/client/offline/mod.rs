//! # Offline Write Queue
//!
//! Durable queuing of user writes made while the device is offline (or
//! while the backend is unreachable), replayed in order once connectivity
//! returns.
//!
//! ## Architecture
//!
//! The offline system consists of:
//! - **Mutation Queue**: GraphQL writes, one record per item, FIFO by enqueue order
//! - **Socket Event Queue**: real-time emissions grouped per channel
//! - **Retry Logic**: attempt ceiling and exponential backoff with jitter
//!
//! ## Key Components
//!
//! - `queue.rs`: Queue types, status transitions and user decisions
//! - `retry.rs`: Retry logic and backoff strategies
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eventsync::client::local_db::LocalStore;
//! use eventsync::client::offline::{MutationQueue, RetryPolicy};
//! use eventsync::shared::MutationKind;
//!
//! # async fn example() -> Result<(), eventsync::shared::SyncError> {
//! let queue = MutationQueue::new(LocalStore::in_memory().await, RetryPolicy::default());
//! queue.enqueue(MutationKind::CancelRegistration {
//!     registration_id: "reg_42".to_string(),
//! }).await?;
//! assert_eq!(queue.count_pending().await, 1);
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod retry;

// Re-export main types
pub use queue::{
    FailureDisposition, MutationQueue, MutationStatus, QueueStats, QueuedMutation, QueuedSocketEvent,
    SocketEventQueue,
};
pub use retry::{BackoffStrategy, RetryPolicy};
