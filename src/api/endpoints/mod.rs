//! API endpoint handlers.
//!
//! One module per resource. Handlers reuse the repository and pipeline
//! layers; they own only HTTP concerns.

pub mod auth;
pub mod communities;
pub mod documents;
pub mod health;
pub mod roles;
