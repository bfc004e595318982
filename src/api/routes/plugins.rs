//! Plugin metadata listing.

use crate::api::{err, ok, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use std::sync::Arc;

pub async fn list_plugins(State(state): State<Arc<AppState>>) -> Response {
    ok(state.registry.list_metadata())
}

pub async fn get_plugin(
    State(state): State<Arc<AppState>>,
    Path(plugin_id): Path<String>,
) -> Response {
    match state.registry.metadata(&plugin_id) {
        Some(metadata) => ok(metadata),
        None => err(
            StatusCode::NOT_FOUND,
            format!("Plugin {} not found", plugin_id),
        ),
    }
}
