//! Display provenance, preview, and out-of-band refresh.

use crate::api::{err, ok, ok_with_message, reply, AppState};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;

/// Provenance of the frame currently on the panel.
pub async fn current(State(state): State<Arc<AppState>>) -> Response {
    let display_state = state.display.get_state();
    let has_preview = state.display.preview_path().is_some();

    ok(json!({
        "status": display_state.status,
        "last_update": display_state.last_push,
        "plugin_name": display_state
            .last_provenance
            .as_ref()
            .map_or("Unknown", |p| p.plugin_name.as_str()),
        "instance_name": display_state
            .last_provenance
            .as_ref()
            .map_or("Unknown", |p| p.instance_name.as_str()),
        "provenance": display_state.last_provenance,
        "display_count": display_state.display_count,
        "error_count": display_state.error_count,
        "has_preview": has_preview,
    }))
}

/// The last frame as image bytes, when the driver exposes one.
pub async fn preview(State(state): State<Arc<AppState>>) -> Response {
    let Some(path) = state.display.preview_path() else {
        return err(StatusCode::NOT_FOUND, "No preview available");
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("png") => "image/png",
                Some("bmp") => "image/bmp",
                _ => "application/octet-stream",
            };
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(_) => err(StatusCode::NOT_FOUND, "No preview available"),
    }
}

/// One-shot render-and-push of the current content.
pub async fn refresh(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.force_refresh().await {
        Ok(()) => ok_with_message("Refresh triggered"),
        Err(e) => reply::<()>(Err(e)),
    }
}
