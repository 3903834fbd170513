//! `GET /events` — a thin pass-through onto
//! `SimulationStore::read_events`, translating query-string filters into an
//! `EventFilter`.

use axum::extract::Query;
use axum::{Extension, Json};
use hospital_twin_core::store::EventFilter;
use hospital_twin_core::types::{EventType, PatientId};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::timefmt::parse_iso8601;

#[derive(Deserialize)]
pub struct EventsQuery {
    pub unit_id: Option<Uuid>,
    pub patient_id: Option<PatientId>,
    pub event_type: Option<EventType>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub scenario_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn list_events(
    Extension(state): Extension<AppState>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = EventFilter {
        unit_id: q.unit_id,
        patient_id: q.patient_id,
        event_type: q.event_type,
        start_time: q.start_time.as_deref().map(parse_iso8601).transpose()?,
        end_time: q.end_time.as_deref().map(parse_iso8601).transpose()?,
        scenario_id: q.scenario_id,
        limit: q.limit,
        offset: q.offset,
    };
    let events = state.store.read_events(&filter).await?;
    Ok(Json(json!({ "events": events })))
}
