//! Role-based permission checks.
//!
//! Rules, checked in order against the user's grants:
//! 1. Grant with no community (global) at a sufficient role → ALLOW
//! 2. Grant scoped to the target community at a sufficient role → ALLOW
//! 3. Default → DENY
//!
//! Sufficiency follows the role hierarchy: admin covers manager covers
//! resident. The grant rows are re-read on every check; there is no cache.

use rusqlite::Connection;
use uuid::Uuid;

use super::AuthError;
use crate::db::repository::role::grants_for_user;
use crate::models::enums::Role;
use crate::models::RoleGrant;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Why access was granted (or denied).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessReason {
    /// A grant with no community scope matched.
    GlobalGrant,
    /// A grant scoped to the target community matched.
    CommunityGrant,
    /// No matching grant.
    Denied,
}

/// Result of a permission check.
#[derive(Debug, Clone)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

/// Evaluate a user's grants against a required role in a community scope.
/// `community_id = None` means the action is global and only a global
/// grant can allow it.
pub fn check_permission(
    grants: &[RoleGrant],
    required: Role,
    community_id: Option<&Uuid>,
) -> AccessDecision {
    // Rule 1: global grants cover every community
    if grants
        .iter()
        .any(|g| g.community_id.is_none() && g.role.satisfies(required))
    {
        return AccessDecision::allow(AccessReason::GlobalGrant);
    }

    // Rule 2: a grant scoped to the target community
    if grants
        .iter()
        .any(|g| g.community_id.is_some() && g.covers(community_id) && g.role.satisfies(required))
    {
        return AccessDecision::allow(AccessReason::CommunityGrant);
    }

    AccessDecision::deny()
}

/// Load the user's grants and enforce the required role. Errors with
/// `AuthError::Forbidden` on deny.
pub fn require_role(
    conn: &Connection,
    user_id: &str,
    required: Role,
    community_id: Option<&Uuid>,
) -> Result<AccessDecision, AuthError> {
    let grants = grants_for_user(conn, user_id)?;
    let decision = check_permission(&grants, required, community_id);
    if !decision.allowed {
        tracing::warn!(
            user_id = %user_id,
            required = %required,
            community_id = ?community_id,
            "Permission denied"
        );
        return Err(AuthError::Forbidden { required });
    }
    Ok(decision)
}
