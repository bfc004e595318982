//! System status and host info.

use crate::api::{ok, AppState};
use crate::system;
use axum::extract::State;
use axum::response::Response;
use serde_json::json;
use std::sync::Arc;

/// Orchestrator + display summary.
pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    ok(json!({
        "running": state.orchestrator.is_running(),
        "orchestrator": state.orchestrator.status(),
        "display": state.display.get_state(),
    }))
}

/// Host metrics: cpu, memory, disk, uptime, temperature.
pub async fn info(State(state): State<Arc<AppState>>) -> Response {
    let data_dir = state.config.snapshot().data.dir;
    ok(system::collect(&data_dir).await)
}
