//! Community CRUD endpoints.
//!
//! Role enforcement per operation: reading needs resident, updating needs
//! manager, creating and deleting need admin. Mutations publish
//! invalidation events.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::ApiContext;
use crate::auth::permissions::{check_permission, require_role};
use crate::db::repository::community as community_repo;
use crate::db::repository::role::grants_for_user;
use crate::events::Event;
use crate::models::enums::Role;
use crate::models::Community;

#[derive(Deserialize)]
pub struct CommunityPayload {
    pub name: String,
    pub address: Option<String>,
}

/// `GET /api/communities` — communities visible to the caller.
/// A global grant sees all; scoped grants see their own communities.
pub async fn list(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<Vec<Community>>, ApiError> {
    let user_id = ctx.current_user(&headers)?;
    let conn = ctx.conn.lock().unwrap();

    let grants = grants_for_user(&conn, &user_id)?;
    let all = community_repo::list_communities(&conn)?;

    let visible = if grants.iter().any(|g| g.community_id.is_none()) {
        all
    } else {
        all.into_iter()
            .filter(|c| check_permission(&grants, Role::Resident, Some(&c.id)).allowed)
            .collect()
    };
    Ok(Json(visible))
}

/// `GET /api/communities/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Community>, ApiError> {
    let user_id = ctx.current_user(&headers)?;
    let conn = ctx.conn.lock().unwrap();

    require_role(&conn, &user_id, Role::Resident, Some(&id))?;
    let community = community_repo::get_community(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Community {id}")))?;
    Ok(Json(community))
}

/// `POST /api/communities` — admin only.
pub async fn create(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Json(payload): Json<CommunityPayload>,
) -> Result<Json<Community>, ApiError> {
    let user_id = ctx.current_user(&headers)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Community name is required".into()));
    }

    let community = {
        let conn = ctx.conn.lock().unwrap();
        require_role(&conn, &user_id, Role::Admin, None)?;

        let now = Utc::now().naive_utc();
        let community = Community {
            id: Uuid::new_v4(),
            name: payload.name.trim().to_string(),
            address: payload.address,
            created_at: now,
            updated_at: now,
        };
        community_repo::insert_community(&conn, &community)?;
        community
    };

    tracing::info!(community_id = %community.id, name = %community.name, "Community created");
    ctx.events.publish(Event::CommunityListChanged);
    Ok(Json(community))
}

/// `PUT /api/communities/:id` — manager of the community (or global).
pub async fn update(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommunityPayload>,
) -> Result<Json<Community>, ApiError> {
    let user_id = ctx.current_user(&headers)?;

    let community = {
        let conn = ctx.conn.lock().unwrap();
        require_role(&conn, &user_id, Role::Manager, Some(&id))?;
        community_repo::update_community(&conn, &id, payload.name.trim(), payload.address.as_deref())?;
        community_repo::get_community(&conn, &id)?
            .ok_or_else(|| ApiError::NotFound(format!("Community {id}")))?
    };

    ctx.events.publish(Event::CommunityChanged { community_id: id });
    Ok(Json(community))
}

/// `DELETE /api/communities/:id` — admin only.
pub async fn delete(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = ctx.current_user(&headers)?;

    {
        let conn = ctx.conn.lock().unwrap();
        require_role(&conn, &user_id, Role::Admin, Some(&id))?;
        community_repo::delete_community(&conn, &id)?;
    }

    tracing::info!(community_id = %id, "Community deleted");
    ctx.events.publish(Event::CommunityListChanged);
    ctx.events.publish(Event::CommunityChanged { community_id: id });
    Ok(Json(serde_json::json!({ "deleted": id })))
}
