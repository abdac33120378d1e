//! OAuth 2.0 Token Endpoint
//!
//! Handles:
//! - Authorization code exchange
//! - Refresh token grants (the access token rotates, the refresh token does not)

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::OAuthError;
use crate::storage::{AccessToken, RefreshToken};
use crate::AppState;

/// Token request (form-encoded)
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    /// Grant type: "authorization_code" or "refresh_token"
    pub grant_type: Option<String>,

    /// Authorization code (for authorization_code grant)
    pub code: Option<String>,

    /// Redirect URI (for authorization_code grant, must match the one the code was issued for)
    pub redirect_uri: Option<String>,

    /// Client credentials, sent in the body (client_secret_post)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    /// Refresh token (for refresh_token grant)
    pub refresh_token: Option<String>,
}

/// Successful token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    pub scope: String,
}

/// Handler for `POST /token`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    request: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let result = match request {
        Ok(Form(request)) => exchange(&state, request).await,
        Err(rejection) => Err(OAuthError::InvalidRequest(rejection.body_text())),
    };

    match result {
        Ok(response) => (
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(response),
        )
            .into_response(),
        Err(e) => {
            tracing::debug!("Token request rejected: {}", e.code());
            e.into_response()
        }
    }
}

/// Dispatch a token request on its grant type
pub async fn exchange(state: &AppState, request: TokenRequest) -> Result<TokenResponse, OAuthError> {
    match request.grant_type.as_deref() {
        Some("authorization_code") => handle_authorization_code(state, &request).await,
        Some("refresh_token") => handle_refresh_token(state, &request).await,
        Some(_) => Err(OAuthError::UnsupportedGrantType),
        None => Err(OAuthError::InvalidRequest("grant_type is required".to_string())),
    }
}

/// Handle authorization_code grant
async fn handle_authorization_code(
    state: &AppState,
    request: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let client_id = authenticate_client(state, request)?;
    let code = required(&request.code, "code")?;
    let redirect_uri = required(&request.redirect_uri, "redirect_uri")?;

    let now = state.clock.now();
    let auth_code = state.codes.redeem(code, client_id, redirect_uri, now).await?;

    let lifetimes = &state.config.tokens;
    let access_token = state.generator.generate();
    let refresh_token = state.generator.generate();

    state
        .tokens
        .store_pair(
            &access_token,
            AccessToken {
                client_id: client_id.to_string(),
                subject: auth_code.subject.clone(),
                scope: auth_code.scope.clone(),
                issued_at: now,
                expires_at: now + lifetimes.access_token_lifetime(),
                refresh_key: None,
            },
            &refresh_token,
            RefreshToken {
                client_id: client_id.to_string(),
                subject: auth_code.subject.clone(),
                scope: auth_code.scope.clone(),
                issued_at: now,
                expires_at: now + lifetimes.refresh_token_lifetime(),
                access_token: None,
            },
        )
        .await?;

    tracing::info!(
        "Issued access token for client {} (subject {})",
        client_id,
        auth_code.subject
    );

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: lifetimes.access_token_lifetime_secs,
        refresh_token,
        scope: auth_code.scope,
    })
}

/// Handle refresh_token grant
async fn handle_refresh_token(
    state: &AppState,
    request: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let client_id = authenticate_client(state, request)?;
    let refresh_token = required(&request.refresh_token, "refresh_token")?;

    let lifetimes = &state.config.tokens;
    let access_token = state.generator.generate();
    let (access, _) = state
        .tokens
        .rotate(
            refresh_token,
            client_id,
            &access_token,
            lifetimes.access_token_lifetime(),
            state.clock.now(),
        )
        .await?;

    tracing::info!("Refreshed access token for client {}", client_id);

    // The refresh token is echoed back unchanged
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: lifetimes.access_token_lifetime_secs,
        refresh_token: refresh_token.to_string(),
        scope: access.scope,
    })
}

fn authenticate_client<'a>(
    state: &AppState,
    request: &'a TokenRequest,
) -> Result<&'a str, OAuthError> {
    let client_id = request.client_id.as_deref().unwrap_or_default();
    let client_secret = request.client_secret.as_deref().unwrap_or_default();

    if state.clients.verify(client_id, client_secret) {
        Ok(client_id)
    } else {
        tracing::warn!("Client authentication failed for client_id {:?}", client_id);
        Err(OAuthError::InvalidClient)
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, OAuthError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest(format!("{} is required", name)))
}
