//! OAuth error responses
//!
//! Every failure in the server is one of these variants. Each maps to a
//! standard OAuth error code and HTTP status and renders as
//! `{"error": ..., "error_description": ...}`.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Client authentication failed")]
    InvalidClient,

    #[error("Redirect URI is not registered for this client")]
    InvalidRedirectUri,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Only the 'code' response type is supported")]
    UnsupportedResponseType,

    #[error("Only authorization_code and refresh_token grant types are supported")]
    UnsupportedGrantType,

    #[error("The resource owner is not authenticated")]
    AccessDenied,

    #[error("{0}")]
    InvalidGrant(&'static str),

    #[error("No access token provided")]
    MissingToken,

    #[error("Access token is invalid")]
    InvalidToken,

    #[error("Access token has expired")]
    TokenExpired,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Error classes, for logging and for callers that branch on the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    ClientAuth,
    RequestValidation,
    Grant,
    TokenValidation,
    Server,
}

/// Token error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

impl OAuthError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidClient => "invalid_client",
            Self::InvalidRedirectUri => "invalid_redirect_uri",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::AccessDenied => "access_denied",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::Storage(_) => "server_error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient => ErrorCategory::ClientAuth,
            Self::InvalidRedirectUri
            | Self::InvalidRequest(_)
            | Self::UnsupportedResponseType
            | Self::UnsupportedGrantType
            | Self::AccessDenied => ErrorCategory::RequestValidation,
            Self::InvalidGrant(_) => ErrorCategory::Grant,
            Self::MissingToken | Self::InvalidToken | Self::TokenExpired => {
                ErrorCategory::TokenValidation
            }
            Self::Storage(_) => ErrorCategory::Server,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::ClientAuth | ErrorCategory::TokenValidation => StatusCode::UNAUTHORIZED,
            ErrorCategory::RequestValidation | ErrorCategory::Grant => StatusCode::BAD_REQUEST,
            ErrorCategory::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let error_description = match self {
            // Backend details stay in the logs
            Self::Storage(_) => "The server could not complete the request".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            error: self.code(),
            error_description,
        }
    }

    /// Render with an explicit status, for endpoints with their own status policy
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        if let Self::Storage(e) = &self {
            tracing::error!("Storage failure: {}", e);
        }

        let body = self.body();
        if self.category() == ErrorCategory::TokenValidation {
            let challenge = format!("Bearer error=\"{}\"", body.error);
            return (status, [(header::WWW_AUTHENTICATE, challenge)], Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.into_response_with_status(status)
    }
}
