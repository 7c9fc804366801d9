//! ---
//! refdata_section: "06-security-access-control"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Opaque bearer token issue and validation."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use refdata_persistence::{StoredToken, TokenRepository, UserRepository};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::SecurityMetrics;
use crate::{Result, SecurityError};

/// Secret handed to the caller once; only its digest is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub access_token: String,
    pub user_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
}

/// Hex SHA-256 of a token secret.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct TokenService {
    tokens: TokenRepository,
    users: UserRepository,
    ttl: Option<Duration>,
    metrics: Option<SecurityMetrics>,
}

impl TokenService {
    pub fn new(tokens: TokenRepository, users: UserRepository, ttl: Option<Duration>) -> Self {
        Self {
            tokens,
            users,
            ttl,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SecurityMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Issue a fresh token for an active user.
    pub async fn issue(&self, user_id: Uuid, label: Option<String>) -> Result<IssuedToken> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SecurityError::UserNotFound(user_id))?;
        if !user.active {
            return Err(SecurityError::UserInactive(user_id));
        }

        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        let access_token = BASE64.encode(secret);
        let created_at = Utc::now();
        let expires_at = self
            .ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| created_at.checked_add_signed(ttl));

        self.tokens
            .insert(&StoredToken {
                token_hash: hash_secret(&access_token),
                user_id,
                label,
                created_at,
                expires_at,
            })
            .await?;
        debug!(%user_id, "issued api token");

        Ok(IssuedToken {
            access_token,
            user_id,
            expires_at,
        })
    }

    /// Resolve a presented secret to its user.
    pub async fn authenticate(&self, secret: &str) -> Result<Principal> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_auth_attempt();
        }
        let outcome = self.resolve(secret).await;
        if let Err(err) = &outcome {
            warn!(error = %err, "authentication rejected");
            if let Some(metrics) = &self.metrics {
                metrics.inc_auth_failure();
            }
        }
        outcome
    }

    async fn resolve(&self, secret: &str) -> Result<Principal> {
        let stored = self
            .tokens
            .find_by_hash(&hash_secret(secret.trim()))
            .await?
            .ok_or(SecurityError::InvalidToken)?;
        if stored.is_expired(Utc::now()) {
            return Err(SecurityError::TokenExpired);
        }
        let user = self
            .users
            .find_by_id(stored.user_id)
            .await?
            .ok_or(SecurityError::UserNotFound(stored.user_id))?;
        if !user.active {
            return Err(SecurityError::UserInactive(user.id));
        }
        Ok(Principal {
            user_id: user.id,
            username: user.username,
        })
    }

    /// Revoke every token of the user; returns how many were dropped.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        Ok(self.tokens.delete_for_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_hex_sha256() {
        let digest = hash_secret("secret");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }
}
