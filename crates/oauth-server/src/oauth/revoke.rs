//! RFC 7009: Token Revocation
//!
//! Always answers `{"success": true}`, whether or not the token existed and
//! even if the backend fails, so the endpoint reveals nothing about stored
//! tokens.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::storage::Revoked;
use crate::AppState;

/// Revocation request (form-encoded)
#[derive(Debug, Default, Deserialize)]
pub struct RevokeRequest {
    pub token: Option<String>,

    /// "access_token" or "refresh_token"; only affects lookup order
    pub token_type_hint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub success: bool,
}

/// Handler for `POST /revoke`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    request: Result<Form<RevokeRequest>, FormRejection>,
) -> Response {
    let request = match request {
        Ok(Form(request)) => request,
        Err(rejection) => {
            tracing::debug!("Unparseable revocation request: {}", rejection.body_text());
            RevokeRequest::default()
        }
    };

    let Some(token) = request.token.as_deref().filter(|t| !t.is_empty()) else {
        return Json(RevokeResponse { success: true }).into_response();
    };

    match state
        .tokens
        .revoke(token, request.token_type_hint.as_deref())
        .await
    {
        Ok(Revoked::Access) => tracing::info!("Revoked access token"),
        Ok(Revoked::Refresh) => tracing::info!("Revoked refresh token and its access token"),
        Ok(Revoked::NotFound) => tracing::debug!("Revocation requested for unknown token"),
        Err(e) => tracing::error!("Revocation failed: {}", e),
    }

    Json(RevokeResponse { success: true }).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::{body::to_bytes, http::StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::Value;

    use super::*;
    use crate::config::Config;
    use crate::storage::flaky::FlakyStore;
    use crate::storage::{AccessToken, CodeStore, RefreshToken, TokenStore};

    async fn revoke(state: Arc<AppState>, token: &str) -> (StatusCode, Value) {
        let request = RevokeRequest {
            token: Some(token.to_string()),
            token_type_hint: None,
        };
        let response = handler(State(state), Ok(Form(request))).await;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_backend_failure_still_reports_success() {
        let access = Arc::new(FlakyStore::<AccessToken>::new());
        let refresh = Arc::new(FlakyStore::<RefreshToken>::new());
        let tokens = TokenStore::new(access.clone(), refresh.clone());
        let now = Utc::now();
        tokens
            .store_pair(
                "A1",
                AccessToken {
                    client_id: "C1".into(),
                    subject: "owner@example.com".into(),
                    scope: String::new(),
                    issued_at: now,
                    expires_at: now + Duration::hours(1),
                    refresh_key: None,
                },
                "R1",
                RefreshToken {
                    client_id: "C1".into(),
                    subject: "owner@example.com".into(),
                    scope: String::new(),
                    issued_at: now,
                    expires_at: now + Duration::days(30),
                    access_token: None,
                },
            )
            .await
            .unwrap();

        let state = Arc::new(
            AppState::new(Config::default(), "https://auth.example.com")
                .with_stores(CodeStore::in_memory(), tokens),
        );

        access.fail_remove.store(true, Ordering::SeqCst);
        let (status, json) = revoke(state.clone(), "A1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "success": true }));

        access.fail_remove.store(false, Ordering::SeqCst);
        let (status, json) = revoke(state.clone(), "A1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "success": true }));
        assert!(state.tokens.access_token("A1").await.unwrap().is_none());
    }
}
