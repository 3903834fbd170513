//! `GET /units`, `GET /units/{id}`, `GET /units/{id}/beds`.
//! All derived from the event log through `QueryService` — see DESIGN.md on
//! why there is no separate live units/beds table.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::timefmt::{now_ms, parse_iso8601};

#[derive(Deserialize)]
pub struct TimeQuery {
    pub time: Option<String>,
}

fn resolve_time(q: &TimeQuery) -> Result<i64, AppError> {
    match &q.time {
        Some(t) => Ok(parse_iso8601(t)?),
        None => Ok(now_ms()),
    }
}

pub async fn list_units(Extension(state): Extension<AppState>) -> Result<Json<Value>, AppError> {
    let units = state.query.list_units().await?;
    Ok(Json(json!({ "units": units })))
}

pub async fn get_unit(
    Extension(state): Extension<AppState>,
    Path(unit_id): Path<Uuid>,
    Query(q): Query<TimeQuery>,
) -> Result<Json<Value>, AppError> {
    let time = resolve_time(&q)?;
    let unit_state = state.query.query_state(time, unit_id).await?;
    Ok(Json(serde_json::to_value(unit_state).map_err(anyhow::Error::from)?))
}

pub async fn get_unit_beds(
    Extension(state): Extension<AppState>,
    Path(unit_id): Path<Uuid>,
    Query(q): Query<TimeQuery>,
) -> Result<Json<Value>, AppError> {
    let time = resolve_time(&q)?;
    let beds = state.query.list_beds(time, unit_id).await?;
    Ok(Json(json!({ "beds": beds })))
}
