//! Shared state for the API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::HeaderMap;
use rusqlite::Connection;
use uuid::Uuid;

use super::error::ApiError;
use crate::auth::AuthProvider;
use crate::events::EventBus;
use crate::pipeline::DocumentPipeline;
use crate::storage::BlobStore;

const SESSION_COOKIE: &str = "comunia_session";

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub conn: Arc<Mutex<Connection>>,
    pub blob_store: Arc<dyn BlobStore>,
    pub pipeline: Arc<DocumentPipeline>,
    pub auth_provider: Arc<dyn AuthProvider>,
    pub events: EventBus,
    sessions: Arc<Mutex<HashMap<String, String>>>,
}

impl ApiContext {
    pub fn new(
        conn: Connection,
        blob_store: Arc<dyn BlobStore>,
        pipeline: Arc<DocumentPipeline>,
        auth_provider: Arc<dyn AuthProvider>,
        events: EventBus,
    ) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            blob_store,
            pipeline,
            auth_provider,
            events,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Issue an opaque session token for a user.
    pub fn issue_session(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), user_id.to_string());
        token
    }

    /// Resolve the authenticated user from the session cookie or a bearer
    /// token. Errors with `Unauthorized` when neither is valid.
    pub fn current_user(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let token = bearer_token(headers)
            .or_else(|| cookie_value(headers, SESSION_COOKIE))
            .ok_or(ApiError::Unauthorized)?;

        self.sessions
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }

    pub fn session_cookie_header(token: &str) -> String {
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
