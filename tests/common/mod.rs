//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - A scripted mock backend that deduplicates idempotency keys
//! - Store and manager fixtures
//! - Token helpers
//! - Custom assertion macros

pub mod assertions;

// Re-export commonly used utilities
pub use auth_helpers::*;
pub use fixtures::*;
pub use mock_backend::*;
