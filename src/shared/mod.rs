//! Shared Module
//!
//! This module contains platform-agnostic types used by every part of the
//! sync layer and by the UI that consumes it: the error taxonomy, the
//! configuration model, sync lifecycle events and the typed operations
//! that can be queued.

/// Sync lifecycle events
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Queueable operation kinds
pub mod operation;

/// Re-export commonly used types for convenience
pub use event::{FailedMutation, SyncEvent, SyncEventType};
pub use error::SyncError;
pub use config::{AppConfig, AppConfigBuilder, AuthPolicy, ConfigError, SyncPolicy, TerminalFailurePolicy};
pub use operation::{MutationKind, SocketEventKind};
