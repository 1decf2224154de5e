/**
 * Authentication Module
 *
 * Keeps the session token usable for the sync layer: decides when a token
 * is expired or close to expiry, refreshes it against the backend with at
 * most one refresh in flight, and tears the session down when a refresh
 * fails.
 *
 * Tokens are JWTs; only the `exp` claim is read here. Signatures are the
 * server's business, so they are not verified client-side.
 */

use crate::client::transport::RefreshClient;
use crate::client::types::{RefreshResponse, UserInfo};
use crate::shared::config::AuthPolicy;
use crate::shared::error::SyncError;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Only the claim the client cares about
#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

/// Decode the `exp` claim of a JWT without verifying its signature
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaim>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
    Utc.timestamp_opt(data.claims.exp, 0).single()
}

/// Undecodable tokens count as expired
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    match token_expiry(token) {
        Some(expiry) => expiry <= now,
        None => true,
    }
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now())
}

/// Whether the token expires within `threshold` of `now`
pub fn needs_refresh_at(token: &str, now: DateTime<Utc>, threshold: Duration) -> bool {
    let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::zero());
    match token_expiry(token) {
        Some(expiry) => expiry - threshold <= now,
        None => true,
    }
}

pub fn needs_refresh(token: &str, threshold: Duration) -> bool {
    needs_refresh_at(token, Utc::now(), threshold)
}

/// Where the session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Valid,
    NearExpiry,
    Refreshing,
    LoggedOut,
}

/// Auth lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A refresh succeeded
    Refreshed { user: UserInfo },
    /// The session was torn down; the UI should navigate to `redirect_to`
    LoggedOut { redirect_to: String },
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    user: Option<UserInfo>,
}

/// Outcome of the most recent refresh, shared with callers that waited on it
#[derive(Debug, Default)]
struct RefreshSlot {
    last: Option<Result<RefreshResponse, SyncError>>,
}

/// Coordinates token refresh for every consumer of the session
pub struct TokenRefreshCoordinator {
    client: Arc<dyn RefreshClient>,
    policy: AuthPolicy,
    login_redirect: String,
    session: RwLock<Option<Session>>,
    refreshing: AtomicBool,
    // bumped after every completed refresh
    epoch: AtomicU64,
    slot: Mutex<RefreshSlot>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for TokenRefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefreshCoordinator")
            .field("policy", &self.policy)
            .field("login_redirect", &self.login_redirect)
            .field("refreshing", &self.refreshing.load(Ordering::SeqCst))
            .finish()
    }
}

impl TokenRefreshCoordinator {
    pub fn new(client: Arc<dyn RefreshClient>, policy: AuthPolicy, login_redirect: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            client,
            policy,
            login_redirect: login_redirect.into(),
            session: RwLock::new(None),
            refreshing: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            slot: Mutex::new(RefreshSlot::default()),
            events,
        }
    }

    /// Install a session (after login, or a token restored at startup)
    pub async fn set_session(&self, token: impl Into<String>, user: Option<UserInfo>) {
        *self.session.write().await = Some(Session {
            token: token.into(),
            user,
        });
    }

    pub async fn current_user(&self) -> Option<UserInfo> {
        self.session.read().await.as_ref()?.user.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> AuthPhase {
        if self.refreshing.load(Ordering::SeqCst) {
            return AuthPhase::Refreshing;
        }
        match self.session.read().await.as_ref() {
            None => AuthPhase::LoggedOut,
            Some(session) if needs_refresh(&session.token, self.policy.refresh_threshold()) => {
                AuthPhase::NearExpiry
            }
            Some(_) => AuthPhase::Valid,
        }
    }

    /// A non-expired token, refreshing first when it is close to expiry
    pub async fn valid_token(&self) -> Result<String, SyncError> {
        let token = match self.session.read().await.as_ref() {
            Some(session) => session.token.clone(),
            None => return Err(SyncError::auth_expired("not signed in")),
        };

        if !needs_refresh(&token, self.policy.refresh_threshold()) {
            return Ok(token);
        }
        self.refresh().await
    }

    /// Refresh the session token.
    ///
    /// Callers that arrive while a refresh is running wait for it and get
    /// its outcome instead of issuing another request.
    pub async fn refresh(&self) -> Result<String, SyncError> {
        self.shared_refresh().await.map(|response| response.token)
    }

    /// Callback form of [`refresh`](Self::refresh); `on_success` gets the
    /// new token and the user it belongs to
    pub async fn refresh_with<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce(&str, &UserInfo),
        F: FnOnce(&SyncError),
    {
        match self.shared_refresh().await {
            Ok(response) => on_success(&response.token, &response.user),
            Err(e) => on_failure(&e),
        }
    }

    async fn shared_refresh(&self) -> Result<RefreshResponse, SyncError> {
        let seen = self.epoch.load(Ordering::SeqCst);
        let mut slot = self.slot.lock().await;

        if self.epoch.load(Ordering::SeqCst) != seen {
            if let Some(outcome) = slot.last.clone() {
                tracing::debug!("Sharing result of concurrent token refresh");
                return outcome;
            }
        }

        self.refreshing.store(true, Ordering::SeqCst);
        let outcome = self.perform_refresh().await;
        self.refreshing.store(false, Ordering::SeqCst);

        slot.last = Some(outcome.clone());
        self.epoch.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn perform_refresh(&self) -> Result<RefreshResponse, SyncError> {
        let current = match self.session.read().await.as_ref() {
            Some(session) => session.token.clone(),
            None => return Err(SyncError::auth_expired("not signed in")),
        };

        tracing::debug!("Refreshing session token");
        let result = match self.client.refresh(&current).await {
            Ok(response) if is_expired(&response.token) => {
                Err(SyncError::auth_expired("refresh returned an expired token"))
            }
            other => other,
        };

        match result {
            Ok(response) => {
                tracing::info!("Session token refreshed for user {}", response.user.id);
                self.set_session(response.token.clone(), Some(response.user.clone())).await;
                let _ = self.events.send(AuthEvent::Refreshed {
                    user: response.user.clone(),
                });
                Ok(response)
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                self.logout().await;
                Err(SyncError::auth_expired(e.to_string()))
            }
        }
    }

    /// Clear the session; emits `LoggedOut` only if there was one
    pub async fn logout(&self) -> bool {
        let previous = self.session.write().await.take();
        if previous.is_none() {
            return false;
        }
        tracing::info!("Session cleared, redirecting to {}", self.login_redirect);
        let _ = self.events.send(AuthEvent::LoggedOut {
            redirect_to: self.login_redirect.clone(),
        });
        true
    }

    /// Re-evaluate the token every `interval` until the session ends
    pub fn spawn_periodic_check(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.phase().await {
                    AuthPhase::LoggedOut => break,
                    AuthPhase::NearExpiry => {
                        if let Err(e) = self.refresh().await {
                            tracing::debug!("Periodic token refresh failed: {}", e);
                        }
                    }
                    AuthPhase::Valid | AuthPhase::Refreshing => {}
                }
            }
            tracing::debug!("Token check stopped");
        })
    }
}
