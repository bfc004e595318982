//! Configuration surface: snapshot, in-memory update, save, revert.

use crate::api::{ok, ok_with_message, reply, AppState};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn get_config(State(state): State<Arc<AppState>>) -> Response {
    ok(state.config.snapshot())
}

/// Validate and replace the in-memory config. Saving is a separate call.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    match state.config.update(body) {
        Ok(()) => ok_with_message("Configuration updated in memory (not saved to file yet)"),
        Err(e) => reply::<Value>(Err(e)),
    }
}

/// Persist the in-memory config, backing up the previous file.
pub async fn save_config(State(state): State<Arc<AppState>>) -> Response {
    match state.config.save() {
        Ok(()) => ok(json!({"restart_required": true})),
        Err(e) => reply::<Value>(Err(e)),
    }
}

/// Reload the on-disk config, discarding in-memory changes.
pub async fn revert_config(State(state): State<Arc<AppState>>) -> Response {
    match state.config.revert() {
        Ok(()) => ok_with_message("Configuration reverted to saved version"),
        Err(e) => reply::<Value>(Err(e)),
    }
}
