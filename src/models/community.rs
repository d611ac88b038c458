use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Role assignment for a user. `community_id = None` is a global grant
/// that applies to every community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub id: Uuid,
    pub user_id: String,
    pub community_id: Option<Uuid>,
    pub role: Role,
}

impl RoleGrant {
    /// Whether this grant applies to the given community scope.
    pub fn covers(&self, community_id: Option<&Uuid>) -> bool {
        match (&self.community_id, community_id) {
            (None, _) => true,
            (Some(granted), Some(asked)) => granted == asked,
            (Some(_), None) => false,
        }
    }
}
