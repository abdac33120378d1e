//! Outstanding authorization codes

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{KeyValueStore, MemoryStore};
use crate::credentials::hash_token;
use crate::error::OAuthError;

/// A pending authorization code, keyed by the hash of its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub redeemed: bool,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Sole owner of authorization code lifetime
///
/// Redeemed codes stay in the store (flagged) until they expire, so a replay
/// is recognised as one rather than as an unknown code.
pub struct CodeStore {
    codes: Arc<dyn KeyValueStore<AuthorizationCode>>,
}

impl CodeStore {
    pub fn new(codes: Arc<dyn KeyValueStore<AuthorizationCode>>) -> Self {
        Self { codes }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::<AuthorizationCode>::new()))
    }

    pub async fn insert(&self, code: &str, record: AuthorizationCode) -> super::Result<()> {
        self.codes.put(&hash_token(code), record).await
    }

    /// Redeem a code for `client_id` and `redirect_uri`
    ///
    /// The false→true transition of `redeemed` is a single compare-and-swap:
    /// of any number of concurrent callers, at most one gets the record back.
    pub async fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationCode, OAuthError> {
        let key = hash_token(code);

        let Some(record) = self.codes.get(&key).await? else {
            return Err(OAuthError::InvalidGrant("Authorization code is invalid"));
        };

        if record.is_expired(now) {
            self.codes.remove(&key).await?;
            return Err(OAuthError::InvalidGrant("Authorization code has expired"));
        }

        if record.redeemed {
            log_replay(&record);
            return Err(OAuthError::InvalidGrant("Authorization code already used"));
        }

        if record.client_id != client_id {
            return Err(OAuthError::InvalidGrant(
                "Authorization code was issued to another client",
            ));
        }

        if record.redirect_uri != redirect_uri {
            return Err(OAuthError::InvalidGrant("Redirect URI mismatch"));
        }

        let redeemed = AuthorizationCode {
            redeemed: true,
            ..record.clone()
        };
        if !self.codes.compare_and_swap(&key, &record, redeemed.clone()).await? {
            // Lost the race to a concurrent redemption
            log_replay(&record);
            return Err(OAuthError::InvalidGrant("Authorization code already used"));
        }

        Ok(redeemed)
    }

    /// Drop codes whose expiry has passed, redeemed or not
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> super::Result<usize> {
        let dropped = self
            .codes
            .retain(&|c: &AuthorizationCode| !c.is_expired(now))
            .await?;
        Ok(dropped.len())
    }
}

fn log_replay(record: &AuthorizationCode) {
    tracing::warn!(
        client_id = %record.client_id,
        subject = %record.subject,
        "Authorization code presented after redemption (possible replay)"
    );
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(now: DateTime<Utc>) -> AuthorizationCode {
        AuthorizationCode {
            client_id: "C1".into(),
            redirect_uri: "https://example.com/cb".into(),
            scope: "gmail.read".into(),
            subject: "owner@example.com".into(),
            issued_at: now,
            expires_at: now + Duration::minutes(10),
            redeemed: false,
        }
    }

    fn assert_invalid_grant(result: Result<AuthorizationCode, OAuthError>, expected: &str) {
        match result {
            Err(OAuthError::InvalidGrant(description)) => assert_eq!(description, expected),
            other => panic!("expected invalid_grant, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_code_redeems_exactly_once() {
        let store = CodeStore::in_memory();
        let now = Utc::now();
        store.insert("XYZ", record(now)).await.unwrap();

        let redeemed = store
            .redeem("XYZ", "C1", "https://example.com/cb", now)
            .await
            .unwrap();
        assert!(redeemed.redeemed);
        assert_eq!(redeemed.subject, "owner@example.com");

        assert_invalid_grant(
            store.redeem("XYZ", "C1", "https://example.com/cb", now).await,
            "Authorization code already used",
        );
    }

    #[tokio::test]
    async fn test_unknown_code_fails() {
        let store = CodeStore::in_memory();
        assert_invalid_grant(
            store
                .redeem("nope", "C1", "https://example.com/cb", Utc::now())
                .await,
            "Authorization code is invalid",
        );
    }

    #[tokio::test]
    async fn test_expired_code_fails_even_if_unused() {
        let store = CodeStore::in_memory();
        let now = Utc::now();
        store.insert("XYZ", record(now)).await.unwrap();

        let later = now + Duration::minutes(10);
        assert_invalid_grant(
            store.redeem("XYZ", "C1", "https://example.com/cb", later).await,
            "Authorization code has expired",
        );
        // Lazily purged, so it now looks unknown even to an earlier clock
        assert_invalid_grant(
            store.redeem("XYZ", "C1", "https://example.com/cb", now).await,
            "Authorization code is invalid",
        );
    }

    #[tokio::test]
    async fn test_mismatches_do_not_consume_code() {
        let store = CodeStore::in_memory();
        let now = Utc::now();
        store.insert("XYZ", record(now)).await.unwrap();

        assert_invalid_grant(
            store.redeem("XYZ", "C1", "https://evil.example/cb", now).await,
            "Redirect URI mismatch",
        );
        assert_invalid_grant(
            store.redeem("XYZ", "C2", "https://example.com/cb", now).await,
            "Authorization code was issued to another client",
        );

        assert!(store
            .redeem("XYZ", "C1", "https://example.com/cb", now)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = CodeStore::in_memory();
        let now = Utc::now();
        store.insert("old", record(now - Duration::hours(1))).await.unwrap();
        store.insert("new", record(now)).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store
            .redeem("new", "C1", "https://example.com/cb", now)
            .await
            .is_ok());
    }
}
