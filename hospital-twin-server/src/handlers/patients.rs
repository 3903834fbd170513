//! `GET /patients`, `GET /patients/{id}`, `GET /patients/{id}/trace`.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use hospital_twin_core::types::PatientId;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct UnitQuery {
    pub unit_id: Uuid,
}

pub async fn list_patients(
    Extension(state): Extension<AppState>,
    Query(q): Query<UnitQuery>,
) -> Result<Json<Value>, AppError> {
    let patients = state.query.list_patients(q.unit_id).await?;
    Ok(Json(json!({ "patients": patients })))
}

pub async fn get_patient(
    Extension(state): Extension<AppState>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<Value>, AppError> {
    let summary = state.query.patient_summary(patient_id).await?;
    Ok(Json(serde_json::to_value(summary).map_err(anyhow::Error::from)?))
}

pub async fn get_patient_trace(
    Extension(state): Extension<AppState>,
    Path(patient_id): Path<PatientId>,
) -> Result<Json<Value>, AppError> {
    let trace = state.query.patient_trace(patient_id).await?;
    Ok(Json(serde_json::to_value(trace).map_err(anyhow::Error::from)?))
}
