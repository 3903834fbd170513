//! Simulation job runner: owns the pending -> running -> completed|failed
//! lifecycle for a single run. The engine's `run` is
//! synchronous and CPU-bound, so it executes on a blocking thread while
//! progress updates drain through an `mpsc` channel onto the async store —
//! the same blocking-work/async-persistence split the teacher's
//! `TaskQueueListener` keeps between its poll loop and its database calls.

use crate::engine::SimulationEngine;
use crate::store::SimulationStore;
use crate::types::{Run, RunStatus, Scenario, Timestamp};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

fn now_epoch_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

pub struct SimulationRunner {
    store: Arc<dyn SimulationStore>,
    max_wall_time: Duration,
    default_seed: u64,
}

impl SimulationRunner {
    pub fn new(store: Arc<dyn SimulationStore>, max_wall_time: Duration, default_seed: u64) -> Self {
        Self {
            store,
            max_wall_time,
            default_seed,
        }
    }

    /// Drive `run_id` from `pending` to a terminal status, persisting
    /// progress and the final result bundle as it goes. Callers spawn this
    /// rather than awaiting it inline so the HTTP handler that created the
    /// run can return immediately (spec.md §6 `POST /simulation/run`).
    pub async fn start_run(&self, run_id: Uuid, scenario: Scenario, unit_id: Uuid) {
        let mut run = match self.store.load_run(run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                error!(%run_id, "run record missing at start");
                return;
            }
            Err(e) => {
                error!(%run_id, error = %e, "failed to load run at start");
                return;
            }
        };

        run.status = RunStatus::Running;
        run.started_at = Some(now_epoch_ms());
        if let Err(e) = self.store.save_run(&run).await {
            error!(%run_id, error = %e, "failed to persist running status");
            return;
        }

        let (progress_tx, mut progress_rx) = mpsc::channel::<u8>(32);
        let seed = scenario.parameters.seed.unwrap_or(self.default_seed);
        let params = scenario.parameters.clone();
        let scenario_id = Some(scenario.id);
        let max_wall_time = self.max_wall_time;

        let compute = tokio::task::spawn_blocking(move || {
            let engine = SimulationEngine::new(params, seed, unit_id, scenario_id)?;
            engine.run(max_wall_time, move |pct| {
                let _ = progress_tx.blocking_send(pct);
            })
        });

        let store = Arc::clone(&self.store);
        let progress_task = tokio::spawn(async move {
            while let Some(pct) = progress_rx.recv().await {
                if let Err(e) = store.update_run_progress(run_id, pct).await {
                    warn!(%run_id, error = %e, "failed to persist progress");
                }
            }
        });

        let compute_result = compute.await;
        let _ = progress_task.await;

        match compute_result {
            Ok(Ok(output)) => {
                if let Err(e) = self.store.append_events(&output.events).await {
                    error!(%run_id, error = %e, "failed to persist run events");
                }
                run.status = RunStatus::Completed;
                run.progress = 100;
                run.completed_at = Some(now_epoch_ms());
                run.metrics = Some(output.bundle.metrics);
                run.timeseries = Some(output.bundle.timeseries);
                run.bottlenecks = Some(output.bundle.bottlenecks);
                run.error_message = None;
            }
            Ok(Err(sim_err)) => {
                run.status = RunStatus::Failed;
                run.completed_at = Some(now_epoch_ms());
                run.error_message = Some(sim_err.to_string());
            }
            Err(join_err) => {
                run.status = RunStatus::Failed;
                run.completed_at = Some(now_epoch_ms());
                run.error_message = Some(format!("engine task did not complete: {join_err}"));
            }
        }

        if let Err(e) = self.store.save_run(&run).await {
            error!(%run_id, error = %e, "failed to persist final run state");
        } else {
            info!(%run_id, status = ?run.status, "run finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_memory::MemoryStore;
    use crate::types::{Acuity, NurseShiftCounts, ScenarioParameters};
    use std::collections::BTreeMap;

    fn baseline_scenario(id: Uuid) -> Scenario {
        let mut acuity_mix = BTreeMap::new();
        acuity_mix.insert(Acuity::Low, 0.3);
        acuity_mix.insert(Acuity::Medium, 0.5);
        acuity_mix.insert(Acuity::High, 0.15);
        acuity_mix.insert(Acuity::Critical, 0.05);
        Scenario {
            id,
            name: "baseline".to_string(),
            parameters: ScenarioParameters {
                arrival_multiplier: 1.0,
                acuity_mix,
                beds_available: 24,
                nurse_count: NurseShiftCounts {
                    day: 6,
                    evening: 6,
                    night: 4,
                },
                imaging_capacity: 1.0,
                transport_capacity: 1.0,
                seed: Some(42),
            },
            is_baseline: true,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn successful_run_transitions_to_completed_with_results() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let scenario_id = Uuid::new_v4();
        let scenario = baseline_scenario(scenario_id);
        store.save_scenario(&scenario).await.unwrap();

        let run_id = Uuid::new_v4();
        store
            .save_run(&Run::new_pending(run_id, scenario_id))
            .await
            .unwrap();

        let runner = SimulationRunner::new(Arc::clone(&store), Duration::from_secs(30), 7);
        runner.start_run(run_id, scenario, Uuid::new_v4()).await;

        let finished = store.load_run(run_id).await.unwrap().unwrap();
        assert_eq!(finished.status, RunStatus::Completed);
        assert_eq!(finished.progress, 100);
        assert!(finished.metrics.is_some());
        assert!(finished.started_at.is_some());
        assert!(finished.completed_at.is_some());
    }

    #[tokio::test]
    async fn invalid_parameters_mark_run_failed_with_message() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let scenario_id = Uuid::new_v4();
        let mut scenario = baseline_scenario(scenario_id);
        scenario.parameters.beds_available = 0; // invalid: out of [1, 100]
        store.save_scenario(&scenario).await.unwrap();

        let run_id = Uuid::new_v4();
        store
            .save_run(&Run::new_pending(run_id, scenario_id))
            .await
            .unwrap();

        let runner = SimulationRunner::new(Arc::clone(&store), Duration::from_secs(30), 7);
        runner.start_run(run_id, scenario, Uuid::new_v4()).await;

        let finished = store.load_run(run_id).await.unwrap().unwrap();
        assert_eq!(finished.status, RunStatus::Failed);
        assert!(finished.error_message.is_some());
    }

    #[tokio::test]
    async fn missing_run_record_is_a_noop() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let scenario_id = Uuid::new_v4();
        let scenario = baseline_scenario(scenario_id);
        let runner = SimulationRunner::new(store, Duration::from_secs(30), 7);
        // No panics, no persisted state for a run that was never created.
        runner.start_run(Uuid::new_v4(), scenario, Uuid::new_v4()).await;
    }
}
