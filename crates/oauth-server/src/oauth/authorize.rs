//! OAuth 2.0 Authorization Endpoint
//!
//! Auto-approves requests for the resource owner reported by the
//! [`IdentitySource`](crate::identity::IdentitySource); no consent page is shown.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::{ErrorCategory, OAuthError};
use crate::storage::AuthorizationCode;
use crate::AppState;

/// Authorization request parameters
///
/// Everything is optional so missing parameters produce OAuth errors rather
/// than extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    /// Must be "code" for authorization code flow
    pub response_type: Option<String>,

    /// The client identifier
    pub client_id: Option<String>,

    /// Redirect URI (must be on the client's allow-list)
    pub redirect_uri: Option<String>,

    /// Client state (passed through to redirect)
    pub state: Option<String>,

    /// Requested scope, stored opaquely
    pub scope: Option<String>,
}

/// Handler for `GET /authorize`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Response {
    let result = match params {
        Ok(Query(params)) => authorize(&state, params).await,
        Err(rejection) => Err(OAuthError::InvalidRequest(rejection.body_text())),
    };

    match result {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => {
            tracing::debug!("Authorization request rejected: {}", e.code());
            // Every authorization error is a 400; there is no client
            // authentication challenge on this endpoint
            let status = match e.category() {
                ErrorCategory::Server => e.status(),
                _ => StatusCode::BAD_REQUEST,
            };
            e.into_response_with_status(status)
        }
    }
}

/// Validate the request, store a new code and build the redirect target
pub async fn authorize(state: &AppState, params: AuthorizeRequest) -> Result<String, OAuthError> {
    let client_id = params
        .client_id
        .as_deref()
        .filter(|id| state.clients.contains(id))
        .ok_or(OAuthError::InvalidClient)?;

    let redirect_uri = params
        .redirect_uri
        .as_deref()
        .filter(|uri| state.clients.is_authorized_redirect(client_id, uri))
        .ok_or_else(|| {
            tracing::warn!(
                "Rejected authorization request for client {} with unregistered redirect URI",
                client_id
            );
            OAuthError::InvalidRedirectUri
        })?;

    if params.response_type.as_deref() != Some("code") {
        return Err(OAuthError::UnsupportedResponseType);
    }

    let subject = state
        .identity
        .authenticated_subject(client_id)
        .ok_or(OAuthError::AccessDenied)?;

    let now = state.clock.now();
    let code = state.generator.generate();
    let record = AuthorizationCode {
        client_id: client_id.to_string(),
        redirect_uri: redirect_uri.to_string(),
        scope: params.scope.unwrap_or_default(),
        subject,
        issued_at: now,
        expires_at: now + state.config.tokens.authorization_code_lifetime(),
        redeemed: false,
    };
    state.codes.insert(&code, record).await?;

    // Codes are base64url and need no escaping
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    let mut location = format!("{}{}code={}", redirect_uri, separator, code);
    if let Some(s) = &params.state {
        location.push_str(&format!("&state={}", urlencoding::encode(s)));
    }

    tracing::info!(
        "Issued authorization code for client {} (auto-approved)",
        client_id
    );

    Ok(location)
}

mod urlencoding {
    pub fn encode(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }
}
