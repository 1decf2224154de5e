//! # Sync Metrics
//!
//! Counters for replay passes. Process-local and reset on restart.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    pub total_passes: u64,
    pub completed_mutations: u64,
    pub failed_mutations: u64,
    pub average_pass_duration: Duration,
    pub last_pass_duration: Option<Duration>,
    last_pass_start: Option<Instant>,
    finished_passes: u32,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass_start(&mut self) {
        self.last_pass_start = Some(Instant::now());
        self.total_passes += 1;
    }

    pub fn record_pass_end(&mut self, completed: usize, failed: usize) {
        self.completed_mutations += completed as u64;
        self.failed_mutations += failed as u64;

        if let Some(start) = self.last_pass_start.take() {
            let duration = start.elapsed();
            self.last_pass_duration = Some(duration);
            self.finished_passes += 1;

            // rolling average
            let total_duration = self.average_pass_duration * (self.finished_passes - 1) + duration;
            self.average_pass_duration = total_duration / self.finished_passes;
        }
    }

    /// Share of replayed items that were confirmed
    pub fn success_rate(&self) -> f64 {
        let attempted = self.completed_mutations + self.failed_mutations;
        if attempted == 0 {
            0.0
        } else {
            self.completed_mutations as f64 / attempted as f64
        }
    }
}
