//! # Sync Metadata Operations
//!
//! Bookkeeping records kept in the `syncMeta` store. Keys are namespaced by
//! purpose so unrelated consumers never collide:
//!
//! - `last_sync_time` - completion time of the last replay pass
//! - `prefetch_<eventId>` - when an event's data was last prefetched for offline use
//! - `socket_queue_<channel>` - queued real-time emissions for one channel
//!
//! Every reader tolerates a missing entry.

use crate::client::local_db::{LocalStore, StoreName};
use chrono::{DateTime, Utc};

/// Key of the last completed replay pass
pub const LAST_SYNC_KEY: &str = "last_sync_time";

/// Prefix of prefetch timestamps
pub const PREFETCH_PREFIX: &str = "prefetch_";

/// Prefix of queued socket events
pub const SOCKET_QUEUE_PREFIX: &str = "socket_queue_";

pub fn prefetch_key(event_id: &str) -> String {
    format!("{}{}", PREFETCH_PREFIX, event_id)
}

pub fn socket_queue_key(channel: &str) -> String {
    format!("{}{}", SOCKET_QUEUE_PREFIX, channel)
}

impl LocalStore {
    /// Set a sync metadata value
    pub async fn set_sync_metadata<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.put(StoreName::SyncMeta, key, value).await
    }

    /// Get a sync metadata value
    pub async fn get_sync_metadata<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(StoreName::SyncMeta, key).await
    }

    /// Get last sync timestamp
    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.get_sync_metadata(LAST_SYNC_KEY).await
    }

    /// Set last sync timestamp
    pub async fn set_last_sync_time(&self) -> bool {
        self.set_sync_metadata(LAST_SYNC_KEY, &Utc::now()).await
    }

    /// Remember that an event's data was just prefetched
    pub async fn record_prefetch(&self, event_id: &str) -> bool {
        self.set_sync_metadata(&prefetch_key(event_id), &Utc::now()).await
    }

    pub async fn last_prefetch(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.get_sync_metadata(&prefetch_key(event_id)).await
    }

    /// Whether cached event data is older than `max_age` (or was never fetched)
    pub async fn is_stale(&self, event_id: &str, max_age: chrono::Duration) -> bool {
        match self.last_prefetch(event_id).await {
            Some(fetched_at) => Utc::now() - fetched_at > max_age,
            None => true,
        }
    }
}
