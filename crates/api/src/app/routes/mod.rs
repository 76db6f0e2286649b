use axum::{routing::get, Router};

pub mod auth;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new().nest("/api/auth", auth::router())
}
