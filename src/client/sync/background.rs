//! # Background Sync Worker
//!
//! A single task that owns every replay pass of a [`SyncManager`]. It reacts
//! to three inputs:
//!
//! - **Commands**: `SyncNow` / `Shutdown` on a bounded `mpsc` channel
//! - **Network Updates**: a reconnect edge triggers an immediate pass
//! - **Scheduler**: periodic retries, spaced by connection quality
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use eventsync::client::sync::SyncManager;
//! # async fn example(manager: Arc<SyncManager>) {
//! let worker = manager.spawn();
//! worker.sync_now().await;
//! worker.shutdown().await;
//! # }
//! ```

use crate::client::sync::network_monitor::NetworkStatus;
use crate::client::sync::scheduler::SyncScheduler;
use crate::client::sync::{SyncManager, SyncTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Commands accepted by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Run a manual pass now
    SyncNow,
    /// Finish the current pass and stop
    Shutdown,
}

/// Handle to the background worker
#[derive(Debug)]
pub struct SyncWorker {
    commands: mpsc::Sender<SyncCommand>,
    handle: JoinHandle<()>,
}

impl SyncWorker {
    pub fn spawn(manager: Arc<SyncManager>) -> Self {
        let (commands, receiver) = mpsc::channel(16);
        // subscribe before spawning so no reconnect edge is missed
        let network = manager.network().subscribe();
        let handle = tokio::spawn(run(manager, receiver, network));
        Self { commands, handle }
    }

    /// Ask for a manual pass; `false` if the worker is gone
    pub async fn sync_now(&self) -> bool {
        self.commands.send(SyncCommand::SyncNow).await.is_ok()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the worker and wait for it
    pub async fn shutdown(self) {
        let _ = self.commands.send(SyncCommand::Shutdown).await;
        if let Err(e) = self.handle.await {
            tracing::error!("Sync worker ended abnormally: {}", e);
        }
    }
}

async fn run(
    manager: Arc<SyncManager>,
    mut commands: mpsc::Receiver<SyncCommand>,
    mut network: broadcast::Receiver<NetworkStatus>,
) {
    let mut scheduler = SyncScheduler::new(manager.policy().retry_interval());
    scheduler.adjust_interval(&manager.network().current().await);
    tracing::info!("Sync worker started");

    loop {
        // offline: no scheduled passes, wake up only for commands and network updates
        let wait = scheduler
            .time_until_next_sync()
            .unwrap_or(Duration::from_secs(3600));

        tokio::select! {
            command = commands.recv() => match command {
                Some(SyncCommand::SyncNow) => {
                    manager.replay(SyncTrigger::Manual).await;
                    scheduler.record_sync();
                }
                Some(SyncCommand::Shutdown) | None => break,
            },
            update = network.recv() => match update {
                Ok(status) => {
                    scheduler.adjust_interval(&status);
                    manager.refresh_state().await;
                    if status.just_reconnected {
                        manager.replay(SyncTrigger::Reconnected).await;
                        scheduler.record_sync();
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Sync worker skipped {} network updates", skipped);
                    let status = manager.network().current().await;
                    scheduler.adjust_interval(&status);
                    // a reconnect edge may have been among them
                    if status.is_online {
                        manager.replay(SyncTrigger::Reconnected).await;
                        scheduler.record_sync();
                    }
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::time::sleep(wait) => {
                if scheduler.should_sync() {
                    manager.replay(SyncTrigger::Scheduled).await;
                    scheduler.record_sync();
                }
            }
        }
    }

    tracing::info!("Sync worker stopped");
}
