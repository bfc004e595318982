//! Plugin-instance CRUD and lifecycle endpoints.

use crate::api::{err, ok, ok_with_message, reply, AppState};
use crate::registry::Settings;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    pub plugin_id: String,
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInstanceRequest {
    pub name: Option<String>,
    pub settings: Option<Settings>,
}

#[derive(Debug, Deserialize)]
pub struct ListInstancesQuery {
    pub plugin_id: Option<String>,
}

pub async fn list_instances(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListInstancesQuery>,
) -> Response {
    ok(state.instances.list(query.plugin_id.as_deref()))
}

pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateInstanceRequest>,
) -> Response {
    reply(
        state
            .instances
            .create(&body.plugin_id, &body.name, body.settings)
            .await,
    )
}

pub async fn get_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.instances.get(&id) {
        Some(instance) => ok(instance),
        None => err(StatusCode::NOT_FOUND, format!("Instance {} not found", id)),
    }
}

pub async fn update_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateInstanceRequest>,
) -> Response {
    reply(state.instances.update(&id, body.name, body.settings).await)
}

pub async fn delete_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.instances.delete(&id).await {
        Ok(()) => ok_with_message("Instance deleted successfully"),
        Err(e) => reply::<()>(Err(e)),
    }
}

pub async fn enable_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.instances.enable(&id).await {
        Ok(()) => ok_with_message("Instance enabled successfully"),
        Err(e) => reply::<()>(Err(e)),
    }
}

pub async fn disable_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.instances.disable(&id).await {
        Ok(()) => ok_with_message("Instance disabled successfully"),
        Err(e) => reply::<()>(Err(e)),
    }
}

/// One-shot render for validation; the panel is never touched.
pub async fn test_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    let (passed, error) = state.instances.test(&id, &state.device).await;
    if passed {
        ok_with_message("Instance test successful")
    } else {
        err(
            StatusCode::BAD_REQUEST,
            error.unwrap_or_else(|| "Test failed".to_string()),
        )
    }
}
