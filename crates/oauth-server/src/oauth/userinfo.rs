//! UserInfo endpoint
//!
//! Runs behind [`require_bearer`](crate::introspection::require_bearer), which
//! has already resolved the subject.

use std::sync::Arc;

use axum::{extract::State, Extension, Json};

use crate::identity::UserProfile;
use crate::introspection::AuthenticatedSubject;
use crate::AppState;

/// Handler for `GET /userinfo`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<AuthenticatedSubject>,
) -> Json<UserProfile> {
    Json(state.identity.profile(&subject.subject))
}
