//! `GET /nurses`.

use axum::extract::Query;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::timefmt::{now_ms, parse_iso8601};

#[derive(Deserialize)]
pub struct NursesQuery {
    pub unit_id: Uuid,
    pub time: Option<String>,
}

pub async fn list_nurses(
    Extension(state): Extension<AppState>,
    Query(q): Query<NursesQuery>,
) -> Result<Json<Value>, AppError> {
    let time = match &q.time {
        Some(t) => parse_iso8601(t)?,
        None => now_ms(),
    };
    let nurses = state.query.list_nurses(time, q.unit_id).await?;
    Ok(Json(json!({ "nurses": nurses })))
}
