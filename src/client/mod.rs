//! Offline Resilience Module
//!
//! Keeps an event-platform client usable through flaky connectivity: user
//! writes are queued durably while offline and replayed in order once the
//! connection returns, and the session token is kept fresh in the
//! background.
//!
//! # Architecture
//!
//! The client module is organized into focused submodules:
//!
//! - **`config`** - Configuration management (server URL, paths, environment overrides)
//! - **`auth`** - Token expiry checks and the refresh coordinator
//! - **`types`** - Wire types (GraphQL envelope, refresh response)
//! - **`transport`** - HTTP and socket seams used for replay
//! - **`local_db`** - Local SQLite store for offline functionality
//! - **`offline`** - Mutation and socket event queues, retry policy
//! - **`sync`** - Network monitor, sync manager and background worker
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs          - Module exports and documentation
//! ├── config.rs       - Configuration management
//! ├── auth.rs         - Token refresh coordinator
//! ├── types.rs        - Wire types
//! ├── transport.rs    - Transport traits and implementations
//! ├── local_db/       - Local persistence store
//! ├── offline/        - Queues and retry policy
//! └── sync/           - Replay orchestration
//! ```

pub mod auth;
pub mod config;
pub mod local_db;
pub mod offline;
pub mod sync;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use auth::{AuthEvent, AuthPhase, TokenRefreshCoordinator};
pub use config::Config;
pub use local_db::{LocalStore, StoreName};
pub use offline::{MutationQueue, MutationStatus, QueuedMutation, QueuedSocketEvent, RetryPolicy, SocketEventQueue};
pub use sync::{ReplayReport, SubmitOutcome, SyncManager, SyncTrigger, SyncWorker};
pub use transport::{ChannelEmitter, EventEmitter, HttpTransport, MutationTransport, OutboundSocketEvent, RefreshClient};
pub use types::UserInfo;
