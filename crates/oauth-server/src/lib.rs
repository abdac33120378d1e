//! OAuth 2.0 authorization server
//!
//! Provides:
//! - RFC 8414 OAuth metadata discovery
//! - Authorization code flow for confidential clients
//! - Token exchange and access token rotation via refresh tokens
//! - Token revocation
//! - Bearer token introspection for protected routes (`/userinfo`, `/validate`)

pub mod clients;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod introspection;
pub mod oauth;
pub mod storage;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::clients::ClientRegistry;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::credentials::{RandomTokenGenerator, TokenGenerator};
use crate::identity::{IdentitySource, StaticIdentity};
use crate::storage::{CodeStore, TokenStore};

pub use crate::error::OAuthError;

/// Shared application state
pub struct AppState {
    pub config: Arc<Config>,
    pub clients: ClientRegistry,
    pub codes: CodeStore,
    pub tokens: TokenStore,
    pub clock: Arc<dyn Clock>,
    pub generator: Arc<dyn TokenGenerator>,
    pub identity: Arc<dyn IdentitySource>,
    /// Issuer base URL, without a trailing slash
    pub public_url: String,
}

impl AppState {
    /// State with in-memory stores, the system clock and random token values
    pub fn new(config: Config, public_url: &str) -> Self {
        let config = Arc::new(config);
        Self {
            clients: ClientRegistry::new(&config.clients),
            codes: CodeStore::in_memory(),
            tokens: TokenStore::in_memory(),
            clock: Arc::new(SystemClock),
            generator: Arc::new(RandomTokenGenerator),
            identity: Arc::new(StaticIdentity::new(config.resource_owner.clone())),
            public_url: public_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentitySource>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_stores(mut self, codes: CodeStore, tokens: TokenStore) -> Self {
        self.codes = codes;
        self.tokens = tokens;
        self
    }
}

/// Build the HTTP router
pub fn router(state: Arc<AppState>) -> Router {
    // Routes that require a valid bearer token
    let protected = Router::new()
        .route("/userinfo", get(oauth::userinfo::handler))
        // Forward-auth check for reverse proxies
        .route("/validate", get(introspection::validate_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            introspection::require_bearer,
        ));

    Router::new()
        // OAuth metadata (RFC 8414)
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth::metadata::handler),
        )
        // Authorization endpoint
        .route("/authorize", get(oauth::authorize::handler))
        // Token endpoint
        .route("/token", post(oauth::token::handler))
        // Revocation endpoint (RFC 7009)
        .route("/revoke", post(oauth::revoke::handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
