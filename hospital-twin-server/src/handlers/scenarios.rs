//! `GET/POST/PUT/DELETE /scenarios` and `GET /scenarios/{id}/runs`.
//! Baseline-deletion protection is enforced by the store
//! layer; this handler just surfaces whatever `SimError` it returns.

use axum::extract::Path;
use axum::{Extension, Json};
use hospital_twin_core::types::{Scenario, ScenarioParameters};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::timefmt::now_ms;

pub async fn list_scenarios(Extension(state): Extension<AppState>) -> Result<Json<Value>, AppError> {
    let scenarios = state.store.list_scenarios().await?;
    Ok(Json(json!({ "scenarios": scenarios })))
}

pub async fn get_scenario(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let scenario = state
        .store
        .load_scenario(id)
        .await?
        .ok_or_else(|| hospital_twin_core::error::SimError::NotFound(format!("scenario {id} not found")))?;
    Ok(Json(serde_json::to_value(scenario).map_err(anyhow::Error::from)?))
}

#[derive(Deserialize)]
pub struct CreateScenarioRequest {
    pub name: String,
    pub parameters: ScenarioParameters,
    #[serde(default)]
    pub is_baseline: bool,
}

pub async fn create_scenario(
    Extension(state): Extension<AppState>,
    Json(req): Json<CreateScenarioRequest>,
) -> Result<Json<Value>, AppError> {
    let scenario = Scenario {
        id: Uuid::new_v4(),
        name: req.name,
        parameters: req.parameters,
        is_baseline: req.is_baseline,
        created_at: now_ms(),
    };
    state.store.save_scenario(&scenario).await?;
    Ok(Json(serde_json::to_value(scenario).map_err(anyhow::Error::from)?))
}

#[derive(Deserialize)]
pub struct UpdateScenarioRequest {
    pub name: String,
    pub parameters: ScenarioParameters,
}

pub async fn update_scenario(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateScenarioRequest>,
) -> Result<Json<Value>, AppError> {
    let existing = state
        .store
        .load_scenario(id)
        .await?
        .ok_or_else(|| hospital_twin_core::error::SimError::NotFound(format!("scenario {id} not found")))?;
    let scenario = Scenario {
        id,
        name: req.name,
        parameters: req.parameters,
        is_baseline: existing.is_baseline,
        created_at: existing.created_at,
    };
    state.store.save_scenario(&scenario).await?;
    Ok(Json(serde_json::to_value(scenario).map_err(anyhow::Error::from)?))
}

pub async fn delete_scenario(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.store.delete_scenario(id).await?;
    Ok(Json(json!({ "deleted": id })))
}

pub async fn list_scenario_runs(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let runs = state.store.list_runs_for_scenario(id).await?;
    Ok(Json(json!({ "runs": runs })))
}

pub async fn scenario_results(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let mut runs = state.store.list_runs_for_scenario(id).await?;
    runs.sort_by_key(|r| r.completed_at.unwrap_or(i64::MIN));
    let latest = runs
        .into_iter()
        .rev()
        .find(|r| r.status == hospital_twin_core::types::RunStatus::Completed)
        .ok_or_else(|| {
            hospital_twin_core::error::SimError::NotFound(format!(
                "no completed run for scenario {id}"
            ))
        })?;
    Ok(Json(json!({
        "run_id": latest.id,
        "metrics": latest.metrics,
        "timeseries": latest.timeseries,
        "bottlenecks": latest.bottlenecks,
    })))
}
