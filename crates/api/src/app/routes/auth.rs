use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::{debug, instrument};

use crate::app::errors::directory_error_to_response;
use crate::app::services::AppServices;
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new().route("/my-roles", get(my_roles))
}

/// Active role assignments of the caller, organizational units joined.
#[instrument(skip_all, fields(user_id = %caller.user_id(), email = ?caller.email()))]
pub async fn my_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    match services.directory.active_roles(caller.user_id()).await {
        Ok(roles) => {
            debug!(role_count = roles.len(), "serving roles");
            Json(json!({ "roles": roles })).into_response()
        }
        Err(e) => directory_error_to_response(e),
    }
}
