//! Authentication and authorization.
//!
//! `provider` exchanges OAuth-style callback codes for sessions;
//! `permissions` answers "may this user act at this role level in this
//! community" from the role_grants table. Default-deny.

pub mod permissions;
pub mod provider;

pub use permissions::{check_permission, require_role, AccessDecision, AccessReason};
pub use provider::{AuthProvider, HttpAuthProvider, MockAuthProvider, Session};

/// Errors from authentication and authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Auth provider transport error: {0}")]
    Transport(String),

    #[error("Forbidden: requires {required} role")]
    Forbidden { required: crate::models::enums::Role },
}
