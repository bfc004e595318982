//! The `{success, data?, message?, error?}` envelope every endpoint returns.
//!
//! Failures always carry a `success=false` body with an error string; the
//! API never returns an empty 500.

use crate::error::InkframeError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// `200 {success: true, data}`.
pub fn ok(data: impl Serialize) -> Response {
    match serde_json::to_value(data) {
        Ok(value) => (
            StatusCode::OK,
            Json(json!({"success": true, "data": value})),
        )
            .into_response(),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Response serialization failed: {}", e),
        ),
    }
}

/// `200 {success: true, message}`.
pub fn ok_with_message(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({"success": true, "message": message})),
    )
        .into_response()
}

/// `{success: false, error}` with the given status.
pub fn err(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(json!({"success": false, "error": error.into()})),
    )
        .into_response()
}

/// Map a core result into the envelope.
pub fn reply<T: Serialize>(result: Result<T, InkframeError>) -> Response {
    match result {
        Ok(data) => ok(data),
        Err(e) => err(status_for(&e), e.to_string()),
    }
}

fn status_for(error: &InkframeError) -> StatusCode {
    match error {
        InkframeError::Validation(_) => StatusCode::BAD_REQUEST,
        InkframeError::PluginNotFound(_) | InkframeError::InstanceNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        InkframeError::StorePersistence(_)
        | InkframeError::Configuration(_)
        | InkframeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        InkframeError::PluginExecution(_) | InkframeError::Display(_) => StatusCode::BAD_GATEWAY,
    }
}
