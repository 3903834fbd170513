//! Persistence trait for scenarios, runs, and the durable event log. The
//! engine never touches this trait directly — only the runner, replay
//! streamer, and read API operate through it, exactly as `ProcessStore` is
//! the sole persistence seam for the teacher's VM and engine.
//!
//! Bed/nurse/patient "current state" is intentionally NOT a live mutable
//! table here: per the `beds.current_patient_id` / `patients.current_bed_id`
//! cycle, that state is always recomputable from the event log, and
//! demo/synthetic seeding of a separate live table is an out-of-scope
//! collaborator. See DESIGN.md for the Open Question this resolves.

use crate::error::SimResult;
use crate::types::{EventType, PersistedEvent, Run, Scenario, Timestamp};
use async_trait::async_trait;
use uuid::Uuid;

/// Filters accepted by `read_events` (spec.md §6 `GET /events`).
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    pub unit_id: Option<Uuid>,
    pub patient_id: Option<u32>,
    pub event_type: Option<EventType>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub scenario_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[async_trait]
pub trait SimulationStore: Send + Sync {
    // ── Scenarios ──

    async fn save_scenario(&self, scenario: &Scenario) -> SimResult<()>;
    async fn load_scenario(&self, id: Uuid) -> SimResult<Option<Scenario>>;
    async fn list_scenarios(&self) -> SimResult<Vec<Scenario>>;
    /// Errors with `SimError::StateViolation` if `id` is the baseline
    /// scenario (spec.md §6: "baseline scenario cannot be deleted").
    async fn delete_scenario(&self, id: Uuid) -> SimResult<()>;

    // ── Runs ──

    async fn save_run(&self, run: &Run) -> SimResult<()>;
    async fn load_run(&self, id: Uuid) -> SimResult<Option<Run>>;
    async fn list_runs_for_scenario(&self, scenario_id: Uuid) -> SimResult<Vec<Run>>;
    /// Cheap, frequent write used by the progress callback path — must not
    /// be allowed to block the engine for long.
    async fn update_run_progress(&self, id: Uuid, progress: u8) -> SimResult<()>;

    // ── Event log (append-only) ──

    async fn append_events(&self, events: &[PersistedEvent]) -> SimResult<()>;
    async fn read_events(&self, filter: &EventFilter) -> SimResult<Vec<PersistedEvent>>;
}
