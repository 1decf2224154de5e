//! # Retry Logic and Backoff Strategies
//!
//! Decides how long a transiently failed item waits before its next replay
//! and when it stops being retried automatically.
//!
//! ## Features
//!
//! - **Exponential Backoff**: Gradually increase retry intervals
//! - **Jitter**: Spread retries of different items apart
//! - **Max Attempts**: Items past the ceiling become `FAILED_TERMINAL`
//!
//! Jitter is derived from the item's idempotency key instead of a random
//! source, so one item always gets the same offset while different items
//! are spread out.

use crate::shared::config::SyncPolicy;
use std::time::Duration;
use uuid::Uuid;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed interval between retries
    Fixed {
        /// Interval between attempts
        interval: Duration,
    },
    /// Exponential backoff with jitter
    Exponential {
        /// First delay
        base: Duration,
        /// Delay ceiling (before jitter)
        max: Duration,
        /// Jitter factor (0.0 to 1.0)
        jitter: f64,
    },
}

impl BackoffStrategy {
    /// Delay before attempt number `attempt + 1`, given `attempt` failures so far
    pub fn delay_for(&self, attempt: u32, seed: &Uuid) -> Duration {
        match self {
            BackoffStrategy::Fixed { interval } => *interval,
            BackoffStrategy::Exponential { base, max, jitter } => {
                let exponent = attempt.saturating_sub(1).min(31);
                let delay = base
                    .checked_mul(1u32 << exponent)
                    .unwrap_or(*max)
                    .min(*max);

                let jitter_span = (delay.as_millis() as f64 * jitter.clamp(0.0, 1.0)) as u64;
                if jitter_span == 0 {
                    return delay;
                }
                let offset = (seed.as_u128() % (jitter_span as u128 + 1)) as u64;
                delay + Duration::from_millis(offset)
            }
        }
    }
}

/// Retry policy for queued items
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SyncPolicy::default())
    }
}

impl From<&SyncPolicy> for RetryPolicy {
    fn from(policy: &SyncPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts.max(1),
            strategy: BackoffStrategy::Exponential {
                base: Duration::from_millis(policy.base_backoff_ms),
                max: Duration::from_millis(policy.max_backoff_ms),
                jitter: policy.jitter,
            },
        }
    }
}

impl RetryPolicy {
    /// Whether an item with `attempts` failed attempts is out of retries
    pub fn should_give_up(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Timestamp before which the item is not retried by a scheduled pass
    pub fn next_attempt_at(&self, attempts: u32, seed: &Uuid) -> chrono::DateTime<chrono::Utc> {
        let delay = self.strategy.delay_for(attempts, seed);
        chrono::Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64)
    }
}
