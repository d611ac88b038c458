//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Authenticated resource routes live under `/api/`; the auth callback and
//! the browser-facing download route sit at the root.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::endpoints;
use super::state::ApiContext;

/// Build the API router with all routes mounted.
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/communities",
            get(endpoints::communities::list).post(endpoints::communities::create),
        )
        .route(
            "/communities/:id",
            get(endpoints::communities::get)
                .put(endpoints::communities::update)
                .delete(endpoints::communities::delete),
        )
        .route("/roles", post(endpoints::roles::create))
        .route("/roles/:id", delete(endpoints::roles::delete))
        .route("/documents", get(endpoints::documents::list))
        .route("/documents/upload", post(endpoints::documents::upload))
        .route("/documents/:id", get(endpoints::documents::get))
        .route("/documents/:id/process", post(endpoints::documents::process));

    Router::new()
        .nest("/api", api)
        .route("/auth/callback", get(endpoints::auth::callback))
        .route("/documents/:id/download", get(endpoints::documents::download))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
