// 🔐 Shared-password sessions
//
// One password for the whole app. A successful login hands out a random
// bearer token that is valid for a fixed TTL. The store never holds a token
// in clear: sessions are keyed by the token's SHA-256 digest.

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 64 hex characters from two v4 UUIDs
fn generate_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

#[derive(Debug, Clone, Copy)]
struct Session {
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
    pub token: String,
    /// Epoch milliseconds
    pub expires_at: i64,
}

/// Session registry, cheap to clone (shared state behind `Arc`)
#[derive(Clone)]
pub struct SessionStore {
    password_digest: String,
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new(password: &str, ttl: Duration) -> Self {
        SessionStore {
            password_digest: digest(password),
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn login(&self, password: &str) -> Result<LoginGrant> {
        self.login_at(password, Utc::now())
    }

    pub fn login_at(&self, password: &str, now: DateTime<Utc>) -> Result<LoginGrant> {
        if password.is_empty() {
            return Err(LedgerError::validation("password is required"));
        }
        if digest(password) != self.password_digest {
            tracing::warn!("🔒 login rejected: wrong password");
            return Err(LedgerError::unauthorized("wrong password"));
        }

        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| LedgerError::invalid_config("session lifetime overflows the calendar"))?;
        let token = generate_token();
        {
            let mut sessions = self.sessions.write().map_err(|_| LedgerError::LockPoisoned)?;
            sessions.insert(digest(&token), Session { expires_at });
        }
        self.cleanup_expired_at(now)?;

        tracing::info!("🔓 login ok, session valid until {}", expires_at);
        Ok(LoginGrant {
            token,
            expires_at: expires_at.timestamp_millis(),
        })
    }

    /// Expiry (epoch ms) of a live token
    pub fn verify(&self, token: &str) -> Result<i64> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<i64> {
        if token.trim().is_empty() {
            return Err(LedgerError::validation("token is required"));
        }

        let key = digest(token);
        let session = {
            let sessions = self.sessions.read().map_err(|_| LedgerError::LockPoisoned)?;
            sessions.get(&key).copied()
        };

        match session {
            None => Err(LedgerError::unauthorized("invalid token")),
            Some(session) if now > session.expires_at => {
                let mut sessions = self.sessions.write().map_err(|_| LedgerError::LockPoisoned)?;
                sessions.remove(&key);
                Err(LedgerError::unauthorized("token expired"))
            }
            Some(session) => Ok(session.expires_at.timestamp_millis()),
        }
    }

    /// Always succeeds, whether or not the token was live
    pub fn logout(&self, token: Option<&str>) -> Result<()> {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut sessions = self.sessions.write().map_err(|_| LedgerError::LockPoisoned)?;
            sessions.remove(&digest(token));
        }
        Ok(())
    }

    /// Drop expired sessions; returns how many were removed
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(|_| LedgerError::LockPoisoned)?;
        let before = sessions.len();
        sessions.retain(|_, session| now <= session.expires_at);
        Ok(before - sessions.len())
    }

    pub fn active_sessions(&self) -> Result<usize> {
        Ok(self.sessions.read().map_err(|_| LedgerError::LockPoisoned)?.len())
    }
}
