//! `POST /simulation/run`, `GET /simulation/{job_id}/status`,
//! `DELETE /simulation/{job_id}`.

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use hospital_twin_core::error::SimError;
use hospital_twin_core::types::{Run, RunStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RunQuery {
    pub scenario_id: Uuid,
    pub unit_id: Uuid,
}

/// Creates a `pending` run record, then hands it to the runner on a detached
/// task so the request returns immediately — the caller polls
/// `GET /simulation/{job_id}/status` (or subscribes over the status
/// WebSocket) for progress.
pub async fn start_run(
    Extension(state): Extension<AppState>,
    Query(q): Query<RunQuery>,
) -> Result<Json<Value>, AppError> {
    let scenario = state
        .store
        .load_scenario(q.scenario_id)
        .await?
        .ok_or_else(|| SimError::NotFound(format!("scenario {} not found", q.scenario_id)))?;

    let run_id = Uuid::new_v4();
    let run = Run::new_pending(run_id, q.scenario_id);
    state.store.save_run(&run).await?;

    let runner = state.runner.clone();
    let unit_id = q.unit_id;
    tokio::spawn(async move {
        runner.start_run(run_id, scenario, unit_id).await;
    });

    Ok(Json(json!({ "run_id": run_id, "status": RunStatus::Pending })))
}

pub async fn run_status(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let run = state
        .store
        .load_run(job_id)
        .await?
        .ok_or_else(|| SimError::NotFound(format!("run {job_id} not found")))?;
    Ok(Json(serde_json::to_value(run).map_err(anyhow::Error::from)?))
}

/// Advisory cancel: marks the run `failed` if it hasn't already reached a
/// terminal status. The blocking compute task itself cannot be interrupted
/// mid-tick, so this only stops progress/results from being
/// reported as if the run were still live.
pub async fn cancel_run(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let mut run = state
        .store
        .load_run(job_id)
        .await?
        .ok_or_else(|| SimError::NotFound(format!("run {job_id} not found")))?;

    if matches!(run.status, RunStatus::Completed | RunStatus::Failed) {
        return Ok(Json(json!({ "run_id": job_id, "status": run.status })));
    }

    run.status = RunStatus::Failed;
    run.error_message = Some("cancelled by client".to_string());
    state.store.save_run(&run).await?;
    Ok(Json(json!({ "run_id": job_id, "status": run.status })))
}
