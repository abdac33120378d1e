//! RFC 8414: OAuth 2.0 Authorization Server Metadata
//!
//! Provides the `/.well-known/oauth-authorization-server` endpoint that clients
//! use to discover OAuth endpoints and capabilities.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// OAuth 2.0 Authorization Server Metadata (RFC 8414)
#[derive(Debug, Serialize)]
pub struct AuthorizationServerMetadata {
    /// The authorization server's issuer identifier (URL)
    pub issuer: String,

    /// URL of the authorization endpoint
    pub authorization_endpoint: String,

    /// URL of the token endpoint
    pub token_endpoint: String,

    /// URL of the userinfo endpoint
    pub userinfo_endpoint: String,

    /// URL of the revocation endpoint
    pub revocation_endpoint: String,

    /// JSON array of OAuth 2.0 response_type values supported
    pub response_types_supported: Vec<String>,

    /// JSON array of OAuth 2.0 grant_type values supported
    pub grant_types_supported: Vec<String>,

    /// JSON array of client authentication methods supported at token endpoint
    pub token_endpoint_auth_methods_supported: Vec<String>,

    pub scopes_supported: Vec<String>,

    /// Empty: PKCE is not offered
    pub code_challenge_methods_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Discovery document for a server published at `base_url`
    pub fn new(base_url: &str, scopes: &[String]) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            issuer: base_url.to_string(),
            authorization_endpoint: format!("{}/authorize", base_url),
            token_endpoint: format!("{}/token", base_url),
            userinfo_endpoint: format!("{}/userinfo", base_url),
            revocation_endpoint: format!("{}/revoke", base_url),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            token_endpoint_auth_methods_supported: vec!["client_secret_post".to_string()],
            scopes_supported: scopes.to_vec(),
            code_challenge_methods_supported: Vec::new(),
        }
    }
}

/// Handler for `GET /.well-known/oauth-authorization-server`
pub async fn handler(State(state): State<Arc<AppState>>) -> Json<AuthorizationServerMetadata> {
    tracing::debug!("Serving authorization server metadata");
    Json(AuthorizationServerMetadata::new(
        &state.public_url,
        &state.config.scopes_supported,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_derive_from_base_url() {
        let metadata =
            AuthorizationServerMetadata::new("https://auth.example.com/", &["system.read".into()]);

        assert_eq!(metadata.issuer, "https://auth.example.com");
        assert_eq!(
            metadata.authorization_endpoint,
            "https://auth.example.com/authorize"
        );
        assert_eq!(metadata.token_endpoint, "https://auth.example.com/token");
        assert_eq!(metadata.userinfo_endpoint, "https://auth.example.com/userinfo");
        assert_eq!(metadata.revocation_endpoint, "https://auth.example.com/revoke");
        assert_eq!(metadata.scopes_supported, vec!["system.read".to_string()]);
    }

    #[test]
    fn test_serialized_shape() {
        let metadata = AuthorizationServerMetadata::new("https://auth.example.com", &[]);
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["response_types_supported"], serde_json::json!(["code"]));
        assert_eq!(
            json["grant_types_supported"],
            serde_json::json!(["authorization_code", "refresh_token"])
        );
        assert_eq!(
            json["token_endpoint_auth_methods_supported"],
            serde_json::json!(["client_secret_post"])
        );
        assert_eq!(json["code_challenge_methods_supported"], serde_json::json!([]));
    }
}
