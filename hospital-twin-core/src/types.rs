use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ─── Scalar aliases ───────────────────────────────────────────

/// Virtual simulation time, minutes since scenario start.
pub type VirtualMinutes = f64;

/// Stable integer identity for an engine-owned entity within one run.
pub type PatientId = u32;
pub type BedId = u32;
pub type NurseId = u32;

/// Epoch milliseconds (UTC), used only at the persistence boundary.
pub type Timestamp = i64;

/// Length of the simulated day, in virtual minutes.
pub const HORIZON_MINUTES: VirtualMinutes = 1440.0;

/// Interval between aggregated time-series samples, in virtual minutes.
pub const SAMPLE_INTERVAL_MINUTES: VirtualMinutes = 15.0;

// ─── Acuity ─────────────────────────────────────────────────────

/// Patient severity category. Drives the length-of-stay distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acuity {
    Low,
    Medium,
    High,
    Critical,
}

impl Acuity {
    pub const ALL: [Acuity; 4] = [Acuity::Low, Acuity::Medium, Acuity::High, Acuity::Critical];

    /// `[lo, hi)` length-of-stay range in virtual minutes.
    pub fn los_range_minutes(self) -> (f64, f64) {
        match self {
            Acuity::Low => (120.0, 360.0),
            Acuity::Medium => (240.0, 720.0),
            Acuity::High => (480.0, 1440.0),
            Acuity::Critical => (720.0, 2880.0),
        }
    }
}

// ─── Scenario parameters ───────────────────────────────────────

/// Immutable input to a single simulation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioParameters {
    pub arrival_multiplier: f64,
    pub acuity_mix: BTreeMap<Acuity, f64>,
    pub beds_available: u32,
    pub nurse_count: NurseShiftCounts,
    pub imaging_capacity: f64,
    pub transport_capacity: f64,
    /// Overrides `Config::default_seed` when present.
    pub seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NurseShiftCounts {
    pub day: u32,
    pub evening: u32,
    pub night: u32,
}

impl ScenarioParameters {
    /// `floor(2 * capacity)` concurrent slots.
    pub fn imaging_slots(&self) -> u32 {
        (2.0 * self.imaging_capacity).floor().max(0.0) as u32
    }

    pub fn transport_slots(&self) -> u32 {
        (2.0 * self.transport_capacity).floor().max(0.0) as u32
    }

    /// Baseline is 12.5 arrivals/hour, scaled by `arrival_multiplier`.
    pub fn arrivals_per_hour(&self) -> f64 {
        12.5 * self.arrival_multiplier
    }
}

/// A persistence-level wrapper around `ScenarioParameters`, carrying identity
/// and the baseline-protection flag. The engine itself never sees this —
/// only `ScenarioParameters` and a seed cross into `SimulationEngine`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Uuid,
    pub name: String,
    pub parameters: ScenarioParameters,
    pub is_baseline: bool,
    pub created_at: Timestamp,
}

// ─── Patient ────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub acuity: Acuity,
    pub arrival_time: VirtualMinutes,
    pub requires_imaging: bool,
    pub requires_consult: bool,
    pub bed_id: Option<BedId>,
    pub nurse_id: Option<NurseId>,
    pub triage_end: Option<VirtualMinutes>,
    pub bed_assigned: Option<VirtualMinutes>,
    pub imaging_request: Option<VirtualMinutes>,
    pub imaging_start: Option<VirtualMinutes>,
    pub imaging_end: Option<VirtualMinutes>,
    pub discharge: Option<VirtualMinutes>,
}

impl Patient {
    pub fn new(id: PatientId, acuity: Acuity, arrival_time: VirtualMinutes) -> Self {
        Self {
            id,
            acuity,
            arrival_time,
            requires_imaging: false,
            requires_consult: false,
            bed_id: None,
            nurse_id: None,
            triage_end: None,
            bed_assigned: None,
            imaging_request: None,
            imaging_start: None,
            imaging_end: None,
            discharge: None,
        }
    }
}

/// Derived per-patient outcome, computed once a patient is discharged (or at
/// horizon, for the wait/imaging-delay fields that don't require discharge).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientOutcome {
    pub patient_id: PatientId,
    pub acuity: Acuity,
    pub wait_time_minutes: Option<f64>,
    pub los_minutes: Option<f64>,
    pub imaging_delay_minutes: Option<f64>,
}

// ─── Bed ────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedType {
    Standard,
    Isolation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bed {
    pub id: BedId,
    pub bed_type: BedType,
    pub is_occupied: bool,
    pub is_cleaning: bool,
    pub patient_id: Option<PatientId>,
    /// Virtual minute at which the bed becomes selectable again (cleaning hold).
    pub available_at: VirtualMinutes,
}

impl Bed {
    pub fn new(id: BedId, bed_type: BedType) -> Self {
        Self {
            id,
            bed_type,
            is_occupied: false,
            is_cleaning: false,
            patient_id: None,
            available_at: 0.0,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_occupied && !self.is_cleaning
    }
}

// ─── Nurse ──────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Nurse {
    pub id: NurseId,
    pub max_patients: u32,
    pub assigned_patients: Vec<PatientId>,
}

impl Nurse {
    pub fn new(id: NurseId) -> Self {
        Self {
            id,
            max_patients: 4,
            assigned_patients: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.assigned_patients.len() as u32 >= self.max_patients
    }
}

// ─── Simulation events (engine-internal) ───────────────────────

/// The kind of a scheduled `SimEvent`. Dispatch is an exhaustive match in
/// `engine::SimulationEngine::dispatch` — see DESIGN.md's note on
/// polymorphism over event kinds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SimEventKind {
    Arrival {
        acuity: Acuity,
        requires_imaging: bool,
        requires_consult: bool,
    },
    TriageEnd,
    ImagingRequest,
    ImagingEnd,
    ConsultRequest,
    ConsultEnd,
    Discharge,
    CleaningEnd { bed_id: BedId },
}

/// A scheduled event in the engine's priority queue. Ordering key is
/// `(time, sequence)`; `sequence` is assigned at push time and breaks ties
/// in insertion order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimEvent {
    pub time: VirtualMinutes,
    pub sequence: u64,
    pub patient_id: Option<PatientId>,
    pub kind: SimEventKind,
}

// ─── Bottlenecks ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    BedAvailability,
    NurseStaffing,
    ImagingCapacity,
    TransportCapacity,
}

impl Constraint {
    /// Fixed human description used by the metrics aggregator.
    pub fn description(self) -> &'static str {
        match self {
            Constraint::BedAvailability => {
                "Patients are waiting because no suitable bed is free."
            }
            Constraint::NurseStaffing => {
                "Nurses are at their patient-load ceiling; ratio stress is occurring."
            }
            Constraint::ImagingCapacity => "Imaging requests are queued for a free slot.",
            Constraint::TransportCapacity => "Transport requests are queued for a free slot.",
        }
    }
}

/// Engine-internal bottleneck log entry, appended on every denied acquisition
/// and on nurse-staffing ceiling events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BottleneckRecord {
    pub time: VirtualMinutes,
    pub constraint: Constraint,
    pub patient_id: Option<PatientId>,
    pub queue_length: Option<usize>,
    pub description: Option<String>,
}

/// Aggregated, ranked bottleneck as returned in a result bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankedBottleneck {
    pub constraint: Constraint,
    pub occurrences: usize,
    pub impact_score: f64,
    pub avg_queue_length: Option<f64>,
    pub description: &'static str,
}

// ─── Time series ────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeSeriesSample {
    pub time: VirtualMinutes,
    pub occupancy_pct: f64,
    pub bed_queue: usize,
    pub imaging_queue: usize,
    pub nurse_load: f64,
}

// ─── Metrics summary ────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_patients: usize,
    pub avg_wait_time_minutes: f64,
    pub median_wait_time_minutes: f64,
    pub max_wait_time_minutes: f64,
    pub avg_los_minutes: f64,
    pub sla_breaches: usize,
    pub avg_occupancy: f64,
    pub peak_occupancy: f64,
    pub avg_nurse_load: f64,
}

/// The full result bundle a run produces, persisted verbatim into
/// `simulation_runs.{metrics,timeseries,bottlenecks}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultBundle {
    pub metrics: MetricsSummary,
    pub timeseries: Vec<TimeSeriesSample>,
    pub bottlenecks: Vec<RankedBottleneck>,
}

// ─── Runs ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub scenario_id: Uuid,
    pub status: RunStatus,
    pub progress: u8,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub metrics: Option<MetricsSummary>,
    pub timeseries: Option<Vec<TimeSeriesSample>>,
    pub bottlenecks: Option<Vec<RankedBottleneck>>,
    pub error_message: Option<String>,
}

impl Run {
    pub fn new_pending(id: Uuid, scenario_id: Uuid) -> Self {
        Self {
            id,
            scenario_id,
            status: RunStatus::Pending,
            progress: 0,
            started_at: None,
            completed_at: None,
            metrics: None,
            timeseries: None,
            bottlenecks: None,
            error_message: None,
        }
    }
}

// ─── Durable events (persistence/replay layer) ─────────────────

/// Event kinds recognized by the replay streamer and read-query layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Arrival,
    Triage,
    AdmissionRequest,
    BedAssignment,
    Transfer,
    ImagingRequest,
    ImagingStart,
    ImagingEnd,
    ConsultRequest,
    ConsultStart,
    ConsultEnd,
    CleaningStart,
    CleaningEnd,
    Discharge,
    Escalation,
    NurseAssignment,
    TransportRequest,
    TransportStart,
    TransportEnd,
}

/// A durable event record, written by a completed run and read by the
/// replay streamer and the read API. `data` is an opaque JSON payload
/// (e.g. `{"wait_minutes": 42.0}` on `bed_assignment`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedEvent {
    pub id: Uuid,
    pub timestamp: Timestamp,
    pub event_type: EventType,
    pub patient_id: Option<PatientId>,
    pub unit_id: Uuid,
    pub bed_id: Option<BedId>,
    pub nurse_id: Option<NurseId>,
    pub data: serde_json::Value,
    pub scenario_id: Option<Uuid>,
}

// ─── Replay streamer ────────────────────────────

/// A single event, projected down to the shape the replay subscriber sees.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMarker {
    pub id: Uuid,
    pub event_type: EventType,
    pub timestamp: Timestamp,
    pub patient_id: Option<PatientId>,
    pub bed_id: Option<BedId>,
    pub data: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BedStatus {
    Occupied,
    Empty,
    Cleaning,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BedChange {
    pub bed_id: BedId,
    pub status: BedStatus,
    pub patient_id: Option<PatientId>,
}

/// Snapshot carried on every tick. `occupancy_pct` is computed from bed
/// status accumulated over the replay session itself; the remaining fields
/// are left `None` ("not computed") rather than hard-coded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayMetricsSnapshot {
    pub occupancy_pct: f64,
    pub average_los_hours: Option<f64>,
    pub average_time_to_bed_minutes: Option<f64>,
    pub sla_breaches: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayDelta {
    pub bed_changes: Vec<BedChange>,
    pub event_markers: Vec<EventMarker>,
    pub metrics: ReplayMetricsSnapshot,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayFrame {
    Tick {
        timestamp: Timestamp,
        delta: ReplayDelta,
    },
    Complete,
    Error {
        message: String,
    },
}

/// Inbound control messages on the replay duplex channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReplayControl {
    Play,
    Pause,
    Seek(Timestamp),
    Speed(f64),
    Stop,
}

// ─── Read-API list views (spec.md §6 HTTP surface) ─────────────

/// One bed's derived status, as surfaced by `GET /units/{id}/beds`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BedView {
    pub bed_id: BedId,
    pub status: BedStatus,
    pub patient_id: Option<PatientId>,
}

/// One nurse's derived current load, as surfaced by `GET /nurses`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NurseView {
    pub nurse_id: NurseId,
    pub assigned_patient_ids: Vec<PatientId>,
}

/// A patient summary row, as surfaced by `GET /patients`/`GET /patients/{id}`
/// — derived from the event log rather than a live patients table (see
/// DESIGN.md on the `store.rs` Open Question).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientSummary {
    pub patient_id: PatientId,
    pub acuity: Option<Acuity>,
    pub arrival_time: Option<Timestamp>,
    pub bed_id: Option<BedId>,
    pub discharged: bool,
}

/// Aggregate KPI view for `GET /metrics/kpi` — combines the point-in-time
/// occupancy/staffing snapshot with a ranked bottleneck summary over the
/// trailing window, rather than re-running the simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KpiSummary {
    pub unit_id: Uuid,
    pub occupancy_pct: f64,
    pub beds_occupied: usize,
    pub beds_cleaning: usize,
    pub beds_empty: usize,
    pub patients_waiting_for_bed: usize,
    pub avg_patients_per_nurse: f64,
    pub bottlenecks: Vec<RankedBottleneck>,
}
