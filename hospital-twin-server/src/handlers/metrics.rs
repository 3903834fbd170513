//! `GET /metrics/kpi`.

use axum::extract::Query;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::timefmt::{now_ms, parse_iso8601};

#[derive(Deserialize)]
pub struct KpiQuery {
    pub unit_id: Uuid,
    pub time: Option<String>,
}

pub async fn kpi(
    Extension(state): Extension<AppState>,
    Query(q): Query<KpiQuery>,
) -> Result<Json<Value>, AppError> {
    let time = match &q.time {
        Some(t) => parse_iso8601(t)?,
        None => now_ms(),
    };
    let summary = state.query.kpi(time, q.unit_id).await?;
    Ok(Json(serde_json::to_value(summary).map_err(anyhow::Error::from)?))
}
