//! Outstanding access and refresh tokens

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{KeyValueStore, MemoryStore};
use crate::credentials::hash_token;
use crate::error::OAuthError;

/// A stored access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub client_id: String,
    pub subject: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Storage key of the refresh token this was minted from (set by the store)
    #[serde(default)]
    pub refresh_key: Option<String>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A stored refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub client_id: String,
    pub subject: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Storage key of the access token currently minted from this refresh token
    ///
    /// Either names a stored access token or is `None`.
    pub access_token: Option<String>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// What a revocation request matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revoked {
    Access,
    Refresh,
    NotFound,
}

/// Sole owner of access and refresh token lifetime
pub struct TokenStore {
    access: Arc<dyn KeyValueStore<AccessToken>>,
    refresh: Arc<dyn KeyValueStore<RefreshToken>>,
}

impl TokenStore {
    pub fn new(
        access: Arc<dyn KeyValueStore<AccessToken>>,
        refresh: Arc<dyn KeyValueStore<RefreshToken>>,
    ) -> Self {
        Self { access, refresh }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::<AccessToken>::new()),
            Arc::new(MemoryStore::<RefreshToken>::new()),
        )
    }

    /// Store a freshly minted token pair, linking each token to the other
    ///
    /// If the refresh token cannot be written the access token is discarded.
    pub async fn store_pair(
        &self,
        access_value: &str,
        access: AccessToken,
        refresh_value: &str,
        refresh: RefreshToken,
    ) -> super::Result<()> {
        let access_key = hash_token(access_value);
        let refresh_key = hash_token(refresh_value);

        let access = AccessToken {
            refresh_key: Some(refresh_key.clone()),
            ..access
        };
        self.access.put(&access_key, access).await?;

        let refresh = RefreshToken {
            access_token: Some(access_key.clone()),
            ..refresh
        };
        if let Err(e) = self.refresh.put(&refresh_key, refresh).await {
            self.discard_access(&access_key).await;
            return Err(e);
        }
        Ok(())
    }

    /// Look up an access token, expired or not
    pub async fn access_token(&self, value: &str) -> super::Result<Option<AccessToken>> {
        self.access.get(&hash_token(value)).await
    }

    /// Look up a refresh token, expired or not
    pub async fn refresh_token(&self, value: &str) -> super::Result<Option<RefreshToken>> {
        self.refresh.get(&hash_token(value)).await
    }

    /// Replace a refresh token's live access token with a new one
    ///
    /// The new access token is stored first and the refresh record's live
    /// reference is swapped to it with compare-and-swap; only after the swap
    /// succeeds is the previous access token removed. A lost swap undoes the
    /// new token and retries against the current record.
    pub async fn rotate(
        &self,
        refresh_value: &str,
        client_id: &str,
        new_access_value: &str,
        access_lifetime: Duration,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, RefreshToken), OAuthError> {
        let refresh_key = hash_token(refresh_value);
        let access_key = hash_token(new_access_value);

        loop {
            let Some(current) = self.refresh.get(&refresh_key).await? else {
                return Err(OAuthError::InvalidGrant("Refresh token is invalid"));
            };

            if current.is_expired(now) {
                self.refresh.remove(&refresh_key).await?;
                return Err(OAuthError::InvalidGrant("Refresh token has expired"));
            }

            if current.client_id != client_id {
                return Err(OAuthError::InvalidGrant(
                    "Refresh token was issued to another client",
                ));
            }

            let access = AccessToken {
                client_id: current.client_id.clone(),
                subject: current.subject.clone(),
                scope: current.scope.clone(),
                issued_at: now,
                expires_at: now + access_lifetime,
                refresh_key: Some(refresh_key.clone()),
            };
            self.access.put(&access_key, access.clone()).await?;

            let rotated = RefreshToken {
                access_token: Some(access_key.clone()),
                ..current.clone()
            };
            let swapped = match self
                .refresh
                .compare_and_swap(&refresh_key, &current, rotated.clone())
                .await
            {
                Ok(swapped) => swapped,
                Err(e) => {
                    self.discard_access(&access_key).await;
                    return Err(e.into());
                }
            };

            if swapped {
                // The new token is already live; a stale old one only outlives
                // its replacement until it expires
                if let Some(old_key) = &current.access_token {
                    if let Err(e) = self.access.remove(old_key).await {
                        tracing::warn!("Failed to remove replaced access token: {}", e);
                    }
                }
                return Ok((access, rotated));
            }

            self.access.remove(&access_key).await?;
            tracing::debug!("Refresh token changed during rotation, retrying");
        }
    }

    /// Revoke a token of either kind
    ///
    /// Revoking a refresh token also revokes its live access token. The hint
    /// only decides which kind is checked first.
    pub async fn revoke(&self, value: &str, hint: Option<&str>) -> super::Result<Revoked> {
        let key = hash_token(value);

        if hint == Some("refresh_token") {
            if self.revoke_refresh(&key).await? {
                return Ok(Revoked::Refresh);
            }
            if self.revoke_access(&key).await? {
                return Ok(Revoked::Access);
            }
        } else {
            if self.revoke_access(&key).await? {
                return Ok(Revoked::Access);
            }
            if self.revoke_refresh(&key).await? {
                return Ok(Revoked::Refresh);
            }
        }

        Ok(Revoked::NotFound)
    }

    async fn revoke_access(&self, key: &str) -> super::Result<bool> {
        let Some(token) = self.access.remove(key).await? else {
            return Ok(false);
        };
        if let Some(refresh_key) = &token.refresh_key {
            self.unlink(refresh_key, key).await?;
        }
        Ok(true)
    }

    async fn revoke_refresh(&self, key: &str) -> super::Result<bool> {
        let Some(record) = self.refresh.remove(key).await? else {
            return Ok(false);
        };
        if let Some(access_key) = &record.access_token {
            self.access.remove(access_key).await?;
        }
        Ok(true)
    }

    /// Clear a refresh record's live reference if it still names `access_key`
    async fn unlink(&self, refresh_key: &str, access_key: &str) -> super::Result<()> {
        loop {
            let Some(current) = self.refresh.get(refresh_key).await? else {
                return Ok(());
            };
            if current.access_token.as_deref() != Some(access_key) {
                return Ok(());
            }

            let cleared = RefreshToken {
                access_token: None,
                ..current.clone()
            };
            if self
                .refresh
                .compare_and_swap(refresh_key, &current, cleared)
                .await?
            {
                return Ok(());
            }
        }
    }

    /// Best-effort removal of an access token that was never handed out
    async fn discard_access(&self, key: &str) {
        if let Err(e) = self.access.remove(key).await {
            tracing::warn!("Failed to discard unissued access token: {}", e);
        }
    }

    /// Drop expired tokens of both kinds; returns how many were dropped
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> super::Result<usize> {
        let refresh = self
            .refresh
            .retain(&|t: &RefreshToken| !t.is_expired(now))
            .await?;
        let access = self
            .access
            .retain(&|t: &AccessToken| !t.is_expired(now))
            .await?;

        for (access_key, token) in &access {
            if let Some(refresh_key) = &token.refresh_key {
                self.unlink(refresh_key, access_key).await?;
            }
        }

        Ok(access.len() + refresh.len())
    }
}
