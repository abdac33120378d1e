//! OAuth 2.0 endpoints
//!
//! Implements:
//! - RFC 8414: OAuth 2.0 Authorization Server Metadata
//! - RFC 6749: Authorization Code and Refresh Token grants
//! - RFC 7009: Token Revocation

pub mod authorize;
pub mod metadata;
pub mod revoke;
pub mod token;
pub mod userinfo;
