//! Token management.
//!
//! # Responsibilities
//! - Issue opaque bearer tokens for authenticated principals
//! - Verify and refresh tokens
//! - Inject the token reference into responses
//!
//! # Design Decisions
//! - In-memory store (`DashMap`), tokens are random UUIDs
//! - Sliding expiry: every successful use extends the token's life
//! - Expired tokens are evicted when presented and by a periodic purge task

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::http::HeaderName;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;
use uuid::Uuid;

use super::context::Principal;
use crate::exchange::ServiceResponse;
use crate::plugins::Plugin;

pub const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("auth-token");
pub const AUTH_TOKEN_VALID_HEADER: HeaderName = HeaderName::from_static("auth-token-valid-until");
pub const AUTH_TOKEN_LOCATION_HEADER: HeaderName = HeaderName::from_static("auth-token-location");

/// A token handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRef {
    pub token: String,
    /// Expiry in seconds since the Unix epoch.
    pub valid_until: u64,
    /// Resource where the token can be inspected or revoked.
    pub location: String,
}

impl TokenRef {
    /// Write the token side-channel headers.
    pub fn inject(&self, response: &mut ServiceResponse) {
        response.set_header(AUTH_TOKEN_HEADER, &self.token);
        response.set_header(AUTH_TOKEN_VALID_HEADER, &self.valid_until.to_string());
        response.set_header(AUTH_TOKEN_LOCATION_HEADER, &self.location);
    }
}

/// Issues and validates bearer tokens.
pub trait TokenManager: Send + Sync {
    fn issue(&self, principal: &Principal) -> TokenRef;

    /// The principal owning a live token.
    fn verify(&self, token: &str) -> Option<Principal>;

    /// Extend a live token and return its new reference.
    fn refresh(&self, token: &str) -> Option<TokenRef>;

    fn invalidate(&self, token: &str) -> bool;
}

#[derive(Debug)]
struct TokenEntry {
    principal: Principal,
    expires_at: Instant,
}

/// Random-token manager with sliding TTL.
#[derive(Debug)]
pub struct RndTokenManager {
    tokens: DashMap<String, TokenEntry>,
    ttl: Duration,
    location: String,
}

impl RndTokenManager {
    pub fn new(ttl: Duration, location: impl Into<String>) -> Self {
        Self {
            tokens: DashMap::new(),
            ttl,
            location: location.into(),
        }
    }

    /// Number of tracked tokens, expired ones included until touched.
    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    /// Drop every expired token.
    pub fn purge_expired(&self) -> usize {
        let before = self.tokens.len();
        let now = Instant::now();
        self.tokens.retain(|_, entry| entry.expires_at > now);
        before - self.tokens.len()
    }

    /// How often `run_purge` sweeps: the TTL, kept within 1s..=60s.
    pub fn purge_interval(&self) -> Duration {
        self.ttl.clamp(Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Sweep expired tokens until shutdown.
    pub async fn run_purge(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.purge_interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = self.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = self.count(), "Expired tokens purged");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Token purge stopped");
                    break;
                }
            }
        }
    }

    fn reference(&self, token: &str) -> TokenRef {
        let valid_until = SystemTime::now()
            .checked_add(self.ttl)
            .unwrap_or_else(SystemTime::now)
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        TokenRef {
            token: token.to_string(),
            valid_until,
            location: format!("{}/{}", self.location.trim_end_matches('/'), token),
        }
    }
}

impl TokenManager for RndTokenManager {
    fn issue(&self, principal: &Principal) -> TokenRef {
        let token = Uuid::new_v4().simple().to_string();
        let mut principal = principal.clone();
        principal.token = None;
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                principal,
                expires_at: Instant::now() + self.ttl,
            },
        );
        tracing::debug!(ttl_secs = self.ttl.as_secs(), "Token issued");
        self.reference(&token)
    }

    fn verify(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        let principal = {
            let entry = self.tokens.get(token)?;
            (entry.expires_at > now).then(|| entry.principal.clone())
        };
        if principal.is_none() {
            self.tokens.remove(token);
        }
        principal
    }

    fn refresh(&self, token: &str) -> Option<TokenRef> {
        let mut entry = self.tokens.get_mut(token)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.tokens.remove(token);
            return None;
        }
        entry.expires_at = Instant::now() + self.ttl;
        drop(entry);
        Some(self.reference(token))
    }

    fn invalidate(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

impl Plugin for RndTokenManager {
    fn as_token_manager(self: Arc<Self>) -> Option<Arc<dyn TokenManager>> {
        Some(self)
    }
}
