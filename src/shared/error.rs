//! Shared Error Types
//!
//! This module defines the error taxonomy used across the resilience layer.
//! Every failure that can happen while persisting, replaying or refreshing
//! maps onto one of these variants, and the variant decides the policy:
//!
//! - `StorageUnavailable` - degrade gracefully, keep running without persistence
//! - `NetworkTransient` - retry with backoff
//! - `ServerRejected` - terminal, surface to the user
//! - `AuthExpired` - force logout
//! - `Timeout` - treated as transient
//! - `Validation` / `Serialization` - rejected before anything is queued
//!
//! # Usage
//!
//! ```rust
//! use eventsync::shared::error::SyncError;
//!
//! let error = SyncError::from_status(503, "upstream unavailable");
//! assert!(error.is_retryable());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across thread boundaries.
use thiserror::Error;

/// Errors produced by the offline queue, sync manager and auth coordinator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Local storage could not be opened or written
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Human-readable error message
        message: String,
    },

    /// Connection dropped, DNS failure, 5xx, 429 ...
    #[error("Transient network error: {message}")]
    NetworkTransient {
        /// Human-readable error message
        message: String,
    },

    /// The backend refused the write (validation, 4xx, GraphQL errors)
    #[error("Rejected by server{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    ServerRejected {
        /// HTTP status, when the rejection came with one
        status: Option<u16>,
        /// Human-readable error message
        message: String,
    },

    /// Session is no longer valid
    #[error("Authentication expired: {message}")]
    AuthExpired {
        /// Human-readable error message
        message: String,
    },

    /// The call did not complete within the bounded wait
    #[error("Timed out after {after_ms} ms")]
    Timeout {
        /// Elapsed budget in milliseconds
        after_ms: u64,
    },

    /// Operation payload failed its schema checks
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create a transient network error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::NetworkTransient {
            message: message.into(),
        }
    }

    /// Create a server rejection
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ServerRejected {
            status,
            message: message.into(),
        }
    }

    /// Create an auth expiry error
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::AuthExpired {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout {
            after_ms: after.as_millis() as u64,
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::auth_expired(format!("{} - {}", status, body)),
            408 | 429 => Self::transient(format!("{} - {}", status, body)),
            500..=599 => Self::transient(format!("{} - {}", status, body)),
            _ => Self::rejected(Some(status), body),
        }
    }

    /// Whether the item should go back to `PENDING` and be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkTransient { .. } | Self::Timeout { .. })
    }

    /// Whether the session must be torn down
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout { after_ms: 0 };
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return Self::serialization(format!("Failed to parse response: {}", err));
        }
        Self::transient(format!("Network error: {}", err))
    }
}
