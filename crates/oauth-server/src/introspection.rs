//! Bearer token introspection for protected routes
//!
//! [`require_bearer`] validates the `Authorization: Bearer` header and attaches
//! an [`AuthenticatedSubject`] to the request for downstream handlers. It only
//! reads token state.
//!
//! `/validate` exposes the same check for reverse proxies (e.g. Caddy
//! forward_auth): 200 plus the subject header if the token is good, 401 otherwise.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};

use crate::error::OAuthError;
use crate::AppState;

/// Header carrying the resolved subject on `/validate` responses
pub const SUBJECT_HEADER: &str = "x-authenticated-subject";

/// The identity behind a validated access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject {
    pub subject: String,
    pub client_id: String,
    pub scope: String,
}

/// Resolve the bearer token in `headers` to its subject
pub async fn introspect(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedSubject, OAuthError> {
    let token = bearer_token(headers).ok_or(OAuthError::MissingToken)?;

    let Some(access) = state.tokens.access_token(token).await? else {
        return Err(OAuthError::InvalidToken);
    };

    if access.is_expired(state.clock.now()) {
        return Err(OAuthError::TokenExpired);
    }

    Ok(AuthenticatedSubject {
        subject: access.subject,
        client_id: access.client_id,
        scope: access.scope,
    })
}

/// Extract the token from `Authorization: Bearer <token>` (scheme is case-insensitive)
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Middleware guarding protected routes
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let result = introspect(&state, request.headers()).await;
    match result {
        Ok(subject) => {
            tracing::debug!(
                "Request authenticated via OAuth token for client {}",
                subject.client_id
            );
            request.extensions_mut().insert(subject);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Bearer token rejected: {}", e.code());
            e.into_response()
        }
    }
}

/// Handler for `GET /validate`
pub async fn validate_handler(Extension(subject): Extension<AuthenticatedSubject>) -> Response {
    (StatusCode::OK, [(SUBJECT_HEADER, subject.subject)], "OK").into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::Duration;

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::Config;
    use crate::storage::{AccessToken, RefreshToken};

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_introspect_outcomes() {
        let clock = Arc::new(ManualClock::default());
        let state = AppState::new(Config::default(), "https://auth.example.com")
            .with_clock(clock.clone());
        let now = clock.now();

        state
            .tokens
            .store_pair(
                "A1",
                AccessToken {
                    client_id: "C1".into(),
                    subject: "owner@example.com".into(),
                    scope: "system.read".into(),
                    issued_at: now,
                    expires_at: now + Duration::hours(1),
                    refresh_key: None,
                },
                "R1",
                RefreshToken {
                    client_id: "C1".into(),
                    subject: "owner@example.com".into(),
                    scope: "system.read".into(),
                    issued_at: now,
                    expires_at: now + Duration::days(30),
                    access_token: None,
                },
            )
            .await
            .unwrap();

        let subject = introspect(&state, &headers("Bearer A1")).await.unwrap();
        assert_eq!(subject.subject, "owner@example.com");
        assert_eq!(subject.scope, "system.read");

        let err = introspect(&state, &HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.code(), "missing_token");

        // A refresh token is not an access token
        let err = introspect(&state, &headers("Bearer R1")).await.unwrap_err();
        assert_eq!(err.code(), "invalid_token");

        clock.advance(Duration::hours(1));
        let err = introspect(&state, &headers("Bearer A1")).await.unwrap_err();
        assert_eq!(err.code(), "token_expired");

        // Validation never purges: still expired, not unknown
        let err = introspect(&state, &headers("Bearer A1")).await.unwrap_err();
        assert_eq!(err.code(), "token_expired");
    }
}
