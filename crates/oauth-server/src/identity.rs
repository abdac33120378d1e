//! Resource-owner identity
//!
//! Authentication of the resource owner happens elsewhere; the server only asks
//! who is signed in when it issues a code, and how to describe a subject on
//! `/userinfo`.

use serde::Serialize;

use crate::config::ResourceOwnerConfig;

/// Profile returned from `/userinfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub email_verified: bool,
    pub name: String,
    pub picture: Option<String>,
}

pub trait IdentitySource: Send + Sync {
    /// The already-authenticated resource owner approving `client_id`, if any
    fn authenticated_subject(&self, client_id: &str) -> Option<String>;

    fn profile(&self, subject: &str) -> UserProfile;
}

/// A single resource owner taken from configuration
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    owner: ResourceOwnerConfig,
}

impl StaticIdentity {
    pub fn new(owner: ResourceOwnerConfig) -> Self {
        Self { owner }
    }
}

impl IdentitySource for StaticIdentity {
    fn authenticated_subject(&self, _client_id: &str) -> Option<String> {
        Some(self.owner.email.clone())
    }

    fn profile(&self, subject: &str) -> UserProfile {
        UserProfile {
            email: subject.to_string(),
            email_verified: true,
            name: self.owner.name.clone(),
            picture: self.owner.picture.clone(),
        }
    }
}
