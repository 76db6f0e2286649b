//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: directory wiring (Postgres or in-memory)
//! - `routes/`: handlers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use genera_auth::Hs256JwtValidator;
use genera_infra::RoleDirectory;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router.
pub fn build_app(jwt_secret: impl AsRef<[u8]>, directory: Arc<dyn RoleDirectory>) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(jwt_secret));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::AppServices::new(directory));

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::trace_requests)))
}
