//! # Sync State Management
//!
//! In-memory view of the replay loop for status indicators. Rebuilt from the
//! store on startup and never persisted itself.

use crate::client::sync::network_monitor::{ConnectionQuality, NetworkStatus};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    pub is_syncing: bool,
    /// Item currently being replayed
    pub current: Option<Uuid>,
    pub last_sync: Option<DateTime<Utc>>,
    /// Queued mutations plus queued socket events
    pub pending_actions: usize,
    pub failed_operations: usize,
    pub network_status: NetworkStatus,
    pub last_error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            is_syncing: false,
            current: None,
            last_sync: None,
            pending_actions: 0,
            failed_operations: 0,
            network_status: NetworkStatus {
                is_online: false,
                connection_quality: ConnectionQuality::Offline,
                just_reconnected: false,
                save_data: false,
            },
            last_error: None,
        }
    }
}

impl SyncState {
    /// Whether the UI should show a "pending" indicator
    pub fn has_pending(&self) -> bool {
        self.pending_actions > 0
    }
}
