//! # Sync Scheduler
//!
//! Decides when the background worker runs a scheduled replay pass.
//! Reconnect-triggered passes bypass the scheduler entirely.
//!
//! ## Features
//!
//! - **Quality Aware**: Slower connections are retried less often
//! - **Save Data**: Halves scheduled traffic when the user asked for it
//! - **Offline**: No scheduled passes at all

use crate::client::sync::network_monitor::{ConnectionQuality, NetworkStatus};
use std::time::{Duration, Instant};

/// Synchronization scheduler
#[derive(Debug)]
pub struct SyncScheduler {
    /// Last pass time
    last_sync: Option<Instant>,
    /// Current interval; `None` while offline
    current_interval: Option<Duration>,
    /// Interval on a good connection
    base_interval: Duration,
}

impl SyncScheduler {
    pub fn new(base_interval: Duration) -> Self {
        Self {
            last_sync: None,
            current_interval: Some(base_interval),
            base_interval,
        }
    }

    /// Check if a scheduled pass is due
    pub fn should_sync(&self) -> bool {
        let Some(interval) = self.current_interval else {
            return false;
        };
        match self.last_sync {
            Some(time) => time.elapsed() >= interval,
            None => true,
        }
    }

    /// Record a finished pass, whatever triggered it
    pub fn record_sync(&mut self) {
        self.last_sync = Some(Instant::now());
    }

    /// Adjust the interval to the current network status
    pub fn adjust_interval(&mut self, status: &NetworkStatus) {
        let mut interval = match status.connection_quality {
            ConnectionQuality::Good => self.base_interval,
            ConnectionQuality::Slow => self.base_interval * 2,
            ConnectionQuality::Offline => {
                self.current_interval = None;
                return;
            }
        };

        if status.save_data {
            interval *= 2;
        }

        self.current_interval = Some(interval);
    }

    pub fn current_interval(&self) -> Option<Duration> {
        self.current_interval
    }

    /// Get time until the next scheduled pass
    pub fn time_until_next_sync(&self) -> Option<Duration> {
        let interval = self.current_interval?;
        let Some(last_sync) = self.last_sync else {
            return Some(Duration::ZERO);
        };

        let elapsed = last_sync.elapsed();
        if elapsed >= interval {
            Some(Duration::ZERO)
        } else {
            Some(interval - elapsed)
        }
    }
}
