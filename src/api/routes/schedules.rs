//! Slot-based schedule CRUD.

use crate::api::{ok, reply, AppState};
use crate::schedule::{TargetType, TimeSlot};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SetSlotRequest {
    pub day: u8,
    pub hour: u8,
    pub target_type: TargetType,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearSlotQuery {
    pub day: u8,
    pub hour: u8,
}

#[derive(Debug, Deserialize)]
pub struct BulkSetRequest {
    pub slots: Vec<SetSlotRequest>,
}

pub async fn list_schedules(State(state): State<Arc<AppState>>) -> Response {
    ok(json!({
        "slots": state.schedule.snapshot(),
        "slot_count": state.schedule.slot_count(),
    }))
}

pub async fn set_slot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetSlotRequest>,
) -> Response {
    reply(
        state
            .schedule
            .set_slot(body.day, body.hour, body.target_type, &body.target_id),
    )
}

pub async fn clear_slot(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClearSlotQuery>,
) -> Response {
    reply(
        state
            .schedule
            .clear_slot(query.day, query.hour)
            .map(|cleared| json!({"cleared": cleared})),
    )
}

/// Atomic multi-set: the whole batch lands, or nothing does.
pub async fn bulk_set_slots(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkSetRequest>,
) -> Response {
    let assignments: Vec<TimeSlot> = body
        .slots
        .into_iter()
        .map(|slot| TimeSlot {
            day: slot.day,
            hour: slot.hour,
            target_type: slot.target_type,
            target_id: slot.target_id,
        })
        .collect();

    reply(
        state
            .schedule
            .bulk_set(&assignments)
            .map(|count| json!({"count": count})),
    )
}

pub async fn clear_all(State(state): State<Arc<AppState>>) -> Response {
    reply(
        state
            .schedule
            .clear_all()
            .map(|count| json!({"cleared": count})),
    )
}

/// Resolve what the schedule says about right now.
pub async fn current(State(state): State<Arc<AppState>>) -> Response {
    let Some(slot) = state.schedule.get_current_slot(None) else {
        return ok(json!({"has_content": false, "source_type": "none"}));
    };

    let instance = state.instances.get(&slot.target_id);
    ok(json!({
        "has_content": true,
        "source_type": "schedule",
        "target_type": slot.target_type,
        "target_id": slot.target_id,
        "target_name": instance.as_ref().map_or("Unknown", |inst| inst.name.as_str()),
        "instance": instance.as_ref().map(|inst| json!({
            "name": inst.name,
            "plugin_id": inst.plugin_id,
            "enabled": inst.enabled,
        })),
        "day": slot.day,
        "hour": slot.hour,
    }))
}
