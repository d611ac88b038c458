//! HTTP API.
//!
//! Exposes the document service over axum. The router is composable —
//! `api_router()` returns a `Router` that can be mounted on any server
//! instance. Handlers authenticate via the session established by the
//! auth callback and enforce roles per community.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::api_router;
pub use state::ApiContext;
