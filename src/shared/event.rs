/**
 * Sync Event System
 *
 * Lifecycle notifications emitted by the sync manager while it replays the
 * offline queue. The UI notification layer consumes these to drive the
 * "pending" indicator, the success toast and the actionable failure banner.
 *
 * Wire shape (camelCase):
 * `{ "type": "sync_complete", "completedCount": 3, "pendingCount": 0, ... }`
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of sync event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventType {
    /// A replay pass started
    SyncStart,
    /// A replay pass finished
    SyncComplete,
    /// A queued mutation became `FAILED_TERMINAL`
    MutationFailed,
}

/// The failed operation named in a `mutation_failed` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailedMutation {
    pub id: Uuid,
    pub operation_name: String,
    pub error: String,
    pub attempt_count: u32,
}

/// Replay lifecycle notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    /// Type of event
    #[serde(rename = "type")]
    pub event_type: SyncEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation: Option<FailedMutation>,
    /// Timestamp when event occurred
    pub timestamp: String,
}

impl SyncEvent {
    fn new(event_type: SyncEventType) -> Self {
        Self {
            event_type,
            pending_count: None,
            completed_count: None,
            failed_count: None,
            mutation: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create a sync_start event
    pub fn sync_start(pending_count: usize) -> Self {
        Self {
            pending_count: Some(pending_count),
            ..Self::new(SyncEventType::SyncStart)
        }
    }

    /// Create a sync_complete event
    pub fn sync_complete(completed_count: usize, pending_count: usize, failed_count: usize) -> Self {
        Self {
            completed_count: Some(completed_count),
            pending_count: Some(pending_count),
            failed_count: Some(failed_count),
            ..Self::new(SyncEventType::SyncComplete)
        }
    }

    /// Create a mutation_failed event
    pub fn mutation_failed(mutation: FailedMutation) -> Self {
        Self {
            mutation: Some(mutation),
            ..Self::new(SyncEventType::MutationFailed)
        }
    }
}
