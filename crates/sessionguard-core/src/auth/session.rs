use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::jwt;
use super::{CorruptRecord, TokenStore};

/// Route the client is sent to after logging out
pub const DEFAULT_LOGIN_ROUTE: &str = "/auth";

/// Outcome of checking the stored token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Nothing stored
    Absent,
    /// Stored token could not be decoded; it has been cleared
    Malformed { reason: String },
    /// Stored token is past its `exp`; it has been cleared
    Expired { expired_at: DateTime<Utc> },
    Authenticated { expires_at: DateTime<Utc> },
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SessionStatus::Authenticated { expires_at } => Some(*expires_at),
            _ => None,
        }
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expires_at().map(|at| at - now)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.time_until_expiry(now)
            .map(|d| d.num_minutes().max(0))
    }

    /// Check if the session will expire within `threshold`
    pub fn expires_within(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.expires_at()
            .map(|at| jwt::is_near_expiry(at, now, threshold))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logout {
    pub redirect_to: String,
}

/// Decides whether the stored bearer token is usable.
///
/// Malformed and expired tokens are removed from the store as a side effect
/// of checking, so a later lookup through [`SessionGuard::token`] does not
/// hand them out again.
pub struct SessionGuard {
    store: Box<dyn TokenStore>,
    login_route: String,
}

impl SessionGuard {
    pub fn new(store: impl TokenStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
        }
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Check the stored token against `now`.
    ///
    /// A store that cannot be reached is an error and is left untouched; only
    /// a record that was read and found damaged is cleared.
    pub fn status_at(&self, now: DateTime<Utc>) -> Result<SessionStatus> {
        let token = match self.store.get() {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return Ok(SessionStatus::Absent),
            Err(e) if e.downcast_ref::<CorruptRecord>().is_none() => return Err(e),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Stored session record corrupt, clearing");
                self.store.remove()?;
                return Ok(SessionStatus::Malformed {
                    reason: format!("{:#}", e),
                });
            }
        };

        match jwt::decode_expiry(&token) {
            Err(e) => {
                warn!(error = %e, "Stored token is malformed, clearing");
                self.store.remove()?;
                Ok(SessionStatus::Malformed {
                    reason: e.to_string(),
                })
            }
            Ok(expires_at) if jwt::is_expired(expires_at, now) => {
                info!(%expires_at, "Stored token expired, clearing");
                self.store.remove()?;
                Ok(SessionStatus::Expired {
                    expired_at: expires_at,
                })
            }
            Ok(expires_at) => {
                debug!(%expires_at, "Stored token is valid");
                Ok(SessionStatus::Authenticated { expires_at })
            }
        }
    }

    pub fn status(&self) -> Result<SessionStatus> {
        self.status_at(Utc::now())
    }

    /// Check if a usable token is stored. Storage failures count as
    /// unauthenticated.
    pub fn is_authenticated(&self) -> bool {
        match self.status() {
            Ok(status) => status.is_authenticated(),
            Err(e) => {
                error!(error = %format!("{:#}", e), "Failed to check session");
                false
            }
        }
    }

    /// Get the stored bearer token as-is, without validating it
    pub fn token(&self) -> Result<Option<String>> {
        self.store.get()
    }

    /// Store a new token and report its status. A token that is already
    /// expired or cannot be decoded is cleared again immediately.
    pub fn login(&self, token: &str) -> Result<SessionStatus> {
        let token = token.trim();
        if token.is_empty() {
            bail!("Token is empty");
        }
        self.store.set(token)?;
        let status = self.status()?;
        if status.is_authenticated() {
            info!("Session token stored");
        }
        Ok(status)
    }

    /// Clear the stored token and return where to send the user next
    pub fn logout(&self) -> Result<Logout> {
        self.store.remove()?;
        info!(redirect = %self.login_route, "Logged out");
        Ok(Logout {
            redirect_to: self.login_route.clone(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
