//! Orchestrator tick control.

use crate::api::{ok, AppState};
use axum::extract::State;
use axum::response::Response;
use serde_json::json;
use std::sync::Arc;

pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    ok(state.orchestrator.scheduler_status())
}

pub async fn pause(State(state): State<Arc<AppState>>) -> Response {
    state.orchestrator.pause();
    ok(json!({
        "message": "Scheduler paused",
        "status": state.orchestrator.scheduler_status(),
    }))
}

pub async fn resume(State(state): State<Arc<AppState>>) -> Response {
    state.orchestrator.resume();
    ok(json!({
        "message": "Scheduler resumed",
        "status": state.orchestrator.scheduler_status(),
    }))
}
