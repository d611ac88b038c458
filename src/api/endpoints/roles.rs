//! Role grant administration.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::ApiContext;
use crate::auth::permissions::require_role;
use crate::db::repository::role as role_repo;
use crate::models::enums::Role;
use crate::models::RoleGrant;

#[derive(Deserialize)]
pub struct GrantPayload {
    pub user_id: String,
    pub community_id: Option<Uuid>,
    pub role: Role,
}

/// `POST /api/roles` — grant a role. Admin over the grant's scope.
pub async fn create(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Json(payload): Json<GrantPayload>,
) -> Result<Json<RoleGrant>, ApiError> {
    let caller = ctx.current_user(&headers)?;
    let conn = ctx.conn.lock().unwrap();

    require_role(&conn, &caller, Role::Admin, payload.community_id.as_ref())?;

    let grant = RoleGrant {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        community_id: payload.community_id,
        role: payload.role,
    };
    role_repo::insert_role_grant(&conn, &grant)?;

    tracing::info!(
        grant_id = %grant.id,
        user_id = %grant.user_id,
        role = %grant.role,
        "Role granted"
    );
    Ok(Json(grant))
}

/// `DELETE /api/roles/:id` — revoke a grant. Global admin only.
pub async fn delete(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = ctx.current_user(&headers)?;
    let conn = ctx.conn.lock().unwrap();

    require_role(&conn, &caller, Role::Admin, None)?;
    role_repo::delete_role_grant(&conn, &id)?;

    Ok(Json(serde_json::json!({ "deleted": id })))
}
