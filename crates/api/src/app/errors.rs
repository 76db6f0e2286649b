use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use genera_infra::DirectoryError;

pub fn directory_error_to_response(err: DirectoryError) -> axum::response::Response {
    tracing::error!(error = %err, "directory call failed");
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "directory_error",
        err.to_string(),
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
