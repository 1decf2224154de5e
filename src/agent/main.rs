/**
 * eventsync Agent Entry Point
 *
 * Headless runner for the offline resilience layer: opens the local store,
 * watches connectivity through the backend health endpoint, keeps the
 * session token fresh and replays queued writes whenever the backend is
 * reachable.
 */

use eventsync::client::auth::AuthEvent;
use eventsync::client::sync::{ConnectivitySignal, NetworkMonitor};
use eventsync::client::{Config, HttpTransport, LocalStore, SyncManager, TokenRefreshCoordinator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Health probe period
const PROBE_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,eventsync=debug".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = Config::from_env()?;
    tracing::info!("Using backend {}", config.server_url());

    let store = LocalStore::open(config.db_path()).await;
    let transport = Arc::new(HttpTransport::new(&config)?);

    let network = NetworkMonitor::new(ConnectivitySignal::offline());
    let probe = network.spawn_probe(transport.client().clone(), config.health_url(), PROBE_INTERVAL);

    let mut manager = SyncManager::new(store, transport.clone(), network, config.app().sync.clone()).await;

    let auth = Arc::new(TokenRefreshCoordinator::new(
        transport.clone(),
        config.app().auth.clone(),
        config.login_redirect(),
    ));
    let token_check = match std::env::var("EVENTSYNC_TOKEN") {
        Ok(token) => {
            auth.set_session(token, None).await;
            manager = manager.with_auth(auth.clone());
            Some(auth.clone().spawn_periodic_check(config.app().auth.check_interval()))
        }
        Err(_) => {
            tracing::warn!("EVENTSYNC_TOKEN not set; replaying without a session");
            None
        }
    };

    let manager = Arc::new(manager);
    let pending = manager.pending_actions().await;
    if pending > 0 {
        tracing::info!("{} actions waiting from a previous run", pending);
    }

    let mut sync_events = BroadcastStream::new(manager.subscribe());
    let event_log = tokio::spawn(async move {
        while let Some(event) = sync_events.next().await {
            match event {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!("sync event {}", json),
                    Err(e) => tracing::warn!("Unserializable sync event: {}", e),
                },
                Err(e) => tracing::debug!("Sync event log lagging: {}", e),
            }
        }
    });

    let worker = manager.clone().spawn();

    let mut auth_events = auth.subscribe();
    let logged_out = async move {
        loop {
            match auth_events.recv().await {
                Ok(AuthEvent::LoggedOut { redirect_to }) => return redirect_to,
                Ok(AuthEvent::Refreshed { user }) => tracing::info!("Session refreshed for {}", user.id),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutting down");
        }
        redirect_to = logged_out => {
            tracing::warn!("Session ended; sign in again at {}", redirect_to);
        }
    }

    worker.shutdown().await;
    probe.abort();
    event_log.abort();
    if let Some(handle) = token_check {
        handle.abort();
    }

    let status = manager.status().await;
    tracing::info!(
        "{} actions still queued, {} waiting for a decision",
        status.pending_actions,
        status.failed_operations
    );
    Ok(())
}
