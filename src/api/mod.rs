//! HTTP/JSON surface over the core components.

mod response;
mod routes;

pub use response::{err, ok, ok_with_message, reply};

use crate::config::ConfigManager;
use crate::display::{DeviceConfig, DisplayController};
use crate::instances::InstanceStore;
use crate::orchestrator::ContentOrchestrator;
use crate::registry::PluginRegistry;
use crate::schedule::ScheduleStore;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{extract::State, response::IntoResponse, Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
pub struct AppState {
    pub config: Arc<ConfigManager>,
    pub registry: Arc<PluginRegistry>,
    pub instances: Arc<InstanceStore>,
    pub schedule: Arc<ScheduleStore>,
    pub orchestrator: Arc<ContentOrchestrator>,
    pub display: Arc<DisplayController>,
    pub device: DeviceConfig,
}

/// Build the full API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/system/status", get(routes::system::status))
        .route("/api/system/info", get(routes::system::info))
        .route(
            "/api/config",
            get(routes::config::get_config).put(routes::config::update_config),
        )
        .route("/api/config/save", post(routes::config::save_config))
        .route("/api/config/revert", post(routes::config::revert_config))
        .route("/api/plugins", get(routes::plugins::list_plugins))
        .route("/api/plugins/:plugin_id", get(routes::plugins::get_plugin))
        .route(
            "/api/instances",
            get(routes::instances::list_instances).post(routes::instances::create_instance),
        )
        .route(
            "/api/instances/:id",
            get(routes::instances::get_instance)
                .put(routes::instances::update_instance)
                .delete(routes::instances::delete_instance),
        )
        .route(
            "/api/instances/:id/enable",
            post(routes::instances::enable_instance),
        )
        .route(
            "/api/instances/:id/disable",
            post(routes::instances::disable_instance),
        )
        .route(
            "/api/instances/:id/test",
            post(routes::instances::test_instance),
        )
        .route("/api/schedules", get(routes::schedules::list_schedules))
        .route(
            "/api/schedules/slot",
            post(routes::schedules::set_slot).delete(routes::schedules::clear_slot),
        )
        .route(
            "/api/schedules/slots/bulk",
            post(routes::schedules::bulk_set_slots),
        )
        .route("/api/schedules/clear", post(routes::schedules::clear_all))
        .route("/api/schedules/current", get(routes::schedules::current))
        .route("/api/scheduler/status", get(routes::scheduler::status))
        .route("/api/scheduler/pause", post(routes::scheduler::pause))
        .route("/api/scheduler/resume", post(routes::scheduler::resume))
        .route("/api/display/current", get(routes::display::current))
        .route("/api/display/preview", get(routes::display::preview))
        .route("/api/display/refresh", post(routes::display::refresh))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness probe.
async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "inkframe",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
