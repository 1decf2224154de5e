//! # Network Monitor
//!
//! Tracks connectivity and connection quality, and tells subscribers when
//! either changes.
//!
//! ## Features
//!
//! - **Connectivity Detection**: Online/offline status from platform signals or a health probe
//! - **Network Quality**: `Slow` on `slow-2g` / `2g` effective connection types
//! - **Reconnect Edge**: `just_reconnected` is set on exactly one notification
//! - **Real-time Updates**: Notifications on a `broadcast` channel
//!
//! On an offline→online transition two notifications are published back to
//! back: the new status with `just_reconnected = true`, then the same status
//! with `just_reconnected = false`. Consumers that replay on reconnect key
//! off the first one.

use reqwest::Client;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Latency above which a probe reports a 2g-class connection
const SLOW_PROBE_LATENCY: Duration = Duration::from_millis(1_500);

/// Effective connection type as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveConnectionType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
}

impl EffectiveConnectionType {
    pub fn is_slow(&self) -> bool {
        matches!(self, Self::Slow2g | Self::TwoG)
    }
}

impl FromStr for EffectiveConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(Self::Slow2g),
            "2g" => Ok(Self::TwoG),
            "3g" => Ok(Self::ThreeG),
            "4g" => Ok(Self::FourG),
            other => Err(format!("unknown effective connection type '{}'", other)),
        }
    }
}

/// Connection quality derived from a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionQuality {
    Good,
    Slow,
    Offline,
}

/// Raw connectivity input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivitySignal {
    pub online: bool,
    pub effective_type: Option<EffectiveConnectionType>,
    pub save_data: bool,
}

impl ConnectivitySignal {
    pub fn online() -> Self {
        Self {
            online: true,
            effective_type: None,
            save_data: false,
        }
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            effective_type: None,
            save_data: false,
        }
    }

    pub fn with_effective_type(mut self, effective_type: EffectiveConnectionType) -> Self {
        self.effective_type = Some(effective_type);
        self
    }

    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }
}

/// Published network status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    pub is_online: bool,
    pub connection_quality: ConnectionQuality,
    /// True only on the notification for an offline→online transition
    pub just_reconnected: bool,
    pub save_data: bool,
}

impl NetworkStatus {
    fn from_signal(signal: &ConnectivitySignal) -> Self {
        let connection_quality = if !signal.online {
            ConnectionQuality::Offline
        } else if signal.effective_type.is_some_and(|t| t.is_slow()) {
            ConnectionQuality::Slow
        } else {
            ConnectionQuality::Good
        };

        Self {
            is_online: signal.online,
            connection_quality,
            just_reconnected: false,
            save_data: signal.save_data,
        }
    }
}

/// Connectivity observer
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    current_status: Arc<RwLock<NetworkStatus>>,
    sender: broadcast::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(initial: ConnectivitySignal) -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            current_status: Arc::new(RwLock::new(NetworkStatus::from_signal(&initial))),
            sender,
        }
    }

    /// Snapshot of the current status
    pub async fn current(&self) -> NetworkStatus {
        *self.current_status.read().await
    }

    pub async fn is_online(&self) -> bool {
        self.current_status.read().await.is_online
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkStatus> {
        self.sender.subscribe()
    }

    /// Feed a connectivity signal; returns the settled status
    pub async fn apply(&self, signal: ConnectivitySignal) -> NetworkStatus {
        let mut status = self.current_status.write().await;
        let next = NetworkStatus::from_signal(&signal);

        if next == *status {
            return next;
        }

        if !status.is_online && next.is_online {
            tracing::info!("Network reconnected ({:?})", next.connection_quality);
            let _ = self.sender.send(NetworkStatus {
                just_reconnected: true,
                ..next
            });
        } else if status.is_online && !next.is_online {
            tracing::info!("Network lost");
        } else {
            tracing::debug!("Network status changed: {:?}", next);
        }

        *status = next;
        let _ = self.sender.send(next);
        next
    }

    /// Poll `url` every `interval` and feed the result as a signal
    pub fn spawn_probe(&self, client: Client, url: String, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let save_data = monitor.current().await.save_data;
                let signal = probe(&client, &url).await.with_save_data(save_data);
                monitor.apply(signal).await;
            }
        })
    }
}

async fn probe(client: &Client, url: &str) -> ConnectivitySignal {
    let started = Instant::now();
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            let effective_type = if started.elapsed() > SLOW_PROBE_LATENCY {
                EffectiveConnectionType::TwoG
            } else {
                EffectiveConnectionType::FourG
            };
            ConnectivitySignal::online().with_effective_type(effective_type)
        }
        Ok(response) => {
            tracing::debug!("Health probe answered {}", response.status());
            ConnectivitySignal::offline()
        }
        Err(e) => {
            tracing::debug!("Health probe failed: {}", e);
            ConnectivitySignal::offline()
        }
    }
}
