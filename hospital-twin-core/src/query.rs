//! Read API: point-in-time queries over the persisted event
//! log. Purely derived state — there is no separate live table for bed or
//! patient status, so every query here replays events up to the requested
//! boundary. See DESIGN.md for why this mirrors the engine's own
//! event-sourced approach to "current state" rather than adding a second
//! mutable table to keep in sync.

use crate::error::{SimError, SimResult};
use crate::store::{EventFilter, SimulationStore};
use crate::types::{
    BedId, BedStatus, BedView, Constraint, EventType, KpiSummary, NurseId, NurseView, PatientId,
    PatientSummary, PersistedEvent, RankedBottleneck, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use uuid::Uuid;

const SLA_THRESHOLD_MINUTES: f64 = 60.0;

/// Fixed heuristic surfaced alongside `summarize_bottlenecks`, not derived
/// from the window's data.
const NURSE_RATIO_HEURISTIC: &str =
    "Safe staffing is typically 1 nurse per 4 patients; sustained ratios above this \
     warrant a nurse_staffing bottleneck review.";

pub struct QueryService {
    store: std::sync::Arc<dyn SimulationStore>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitState {
    pub unit_id: Uuid,
    pub time: Timestamp,
    pub beds_occupied: usize,
    pub beds_cleaning: usize,
    pub beds_empty: usize,
    pub patients_waiting_for_bed: usize,
    pub nurse_count: usize,
    pub avg_patients_per_nurse: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientTrace {
    pub patient_id: PatientId,
    pub events: Vec<PersistedEvent>,
    pub total_time_minutes: Option<f64>,
    pub wait_for_bed_minutes: Option<f64>,
    pub handoffs: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BottleneckSummary {
    pub total_assignments: usize,
    pub avg_wait_minutes: f64,
    pub sla_breaches: usize,
    pub ranked: Vec<RankedBottleneck>,
    pub nurse_ratio_heuristic: &'static str,
}

impl QueryService {
    pub fn new(store: std::sync::Arc<dyn SimulationStore>) -> Self {
        Self { store }
    }

    pub async fn query_state(&self, time: Timestamp, unit_id: Uuid) -> SimResult<UnitState> {
        let filter = EventFilter {
            unit_id: Some(unit_id),
            end_time: Some(time),
            ..Default::default()
        };
        let events = self.store.read_events(&filter).await?;

        let mut bed_state: HashMap<BedId, BedStatus> = HashMap::new();
        let mut patients_with_bed: HashSet<PatientId> = HashSet::new();
        let mut patients_discharged: HashSet<PatientId> = HashSet::new();
        let mut patients_admitted: HashSet<PatientId> = HashSet::new();
        let mut nurse_loads: HashMap<NurseId, HashSet<PatientId>> = HashMap::new();

        for event in &events {
            match event.event_type {
                EventType::AdmissionRequest => {
                    if let Some(pid) = event.patient_id {
                        patients_admitted.insert(pid);
                    }
                }
                EventType::BedAssignment => {
                    if let Some(bed_id) = event.bed_id {
                        bed_state.insert(bed_id, BedStatus::Occupied);
                    }
                    if let Some(pid) = event.patient_id {
                        patients_with_bed.insert(pid);
                    }
                }
                EventType::CleaningStart => {
                    if let Some(bed_id) = event.bed_id {
                        bed_state.insert(bed_id, BedStatus::Cleaning);
                    }
                }
                EventType::CleaningEnd => {
                    if let Some(bed_id) = event.bed_id {
                        bed_state.insert(bed_id, BedStatus::Empty);
                    }
                }
                EventType::Discharge => {
                    if let Some(bed_id) = event.bed_id {
                        bed_state.insert(bed_id, BedStatus::Empty);
                    }
                    if let Some(pid) = event.patient_id {
                        patients_discharged.insert(pid);
                    }
                }
                EventType::NurseAssignment => {
                    if let (Some(nurse_id), Some(pid)) = (event.nurse_id, event.patient_id) {
                        nurse_loads.entry(nurse_id).or_default().insert(pid);
                    }
                }
                _ => {}
            }
        }

        // A discharge carries its nurse_id, so the load can be released even
        // without a distinct "nurse_release" event kind.
        for event in &events {
            if event.event_type == EventType::Discharge {
                if let (Some(nurse_id), Some(pid)) = (event.nurse_id, event.patient_id) {
                    if let Some(load) = nurse_loads.get_mut(&nurse_id) {
                        load.remove(&pid);
                    }
                }
            }
        }

        let beds_occupied = bed_state.values().filter(|s| **s == BedStatus::Occupied).count();
        let beds_cleaning = bed_state.values().filter(|s| **s == BedStatus::Cleaning).count();
        let beds_empty = bed_state.values().filter(|s| **s == BedStatus::Empty).count();

        let patients_waiting_for_bed = patients_admitted
            .iter()
            .filter(|pid| !patients_with_bed.contains(*pid) && !patients_discharged.contains(*pid))
            .count();

        let nurse_count = nurse_loads.len();
        let avg_patients_per_nurse = if nurse_count == 0 {
            0.0
        } else {
            nurse_loads.values().map(|l| l.len()).sum::<usize>() as f64 / nurse_count as f64
        };

        Ok(UnitState {
            unit_id,
            time,
            beds_occupied,
            beds_cleaning,
            beds_empty,
            patients_waiting_for_bed,
            nurse_count,
            avg_patients_per_nurse,
        })
    }

    pub async fn patient_trace(&self, patient_id: PatientId) -> SimResult<PatientTrace> {
        let filter = EventFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        };
        let mut events = self.store.read_events(&filter).await?;
        events.sort_by_key(|e| e.timestamp);

        if events.is_empty() {
            return Err(SimError::NotFound(format!("patient {patient_id}")));
        }

        let arrival = events
            .iter()
            .find(|e| e.event_type == EventType::Arrival)
            .map(|e| e.timestamp);
        let bed_assigned = events
            .iter()
            .find(|e| e.event_type == EventType::BedAssignment)
            .map(|e| e.timestamp);
        let discharge = events
            .iter()
            .find(|e| e.event_type == EventType::Discharge)
            .map(|e| e.timestamp);
        let handoffs = events
            .iter()
            .filter(|e| e.event_type == EventType::NurseAssignment)
            .count();

        let minutes = |from: Timestamp, to: Timestamp| (to - from) as f64 / 60_000.0;

        Ok(PatientTrace {
            patient_id,
            total_time_minutes: match (arrival, discharge) {
                (Some(a), Some(d)) => Some(minutes(a, d)),
                _ => None,
            },
            wait_for_bed_minutes: match (arrival, bed_assigned) {
                (Some(a), Some(b)) => Some(minutes(a, b)),
                _ => None,
            },
            handoffs,
            events,
        })
    }

    /// Distinct unit ids that appear anywhere in the event log. There is no
    /// separate units catalog (see DESIGN.md); a unit "exists" here once at
    /// least one simulation run or demo dataset has written events for it.
    pub async fn list_units(&self) -> SimResult<Vec<Uuid>> {
        let events = self.store.read_events(&EventFilter::default()).await?;
        let units: BTreeSet<Uuid> = events.iter().map(|e| e.unit_id).collect();
        Ok(units.into_iter().collect())
    }

    /// Per-bed derived status for `unit_id` as of `time` (`GET
    /// /units/{id}/beds`). Beds that have never appeared in an event simply
    /// don't show up — there is no fixed bed count to backfill without a
    /// scenario's `beds_available`, which this read path does not have.
    pub async fn list_beds(&self, time: Timestamp, unit_id: Uuid) -> SimResult<Vec<BedView>> {
        let filter = EventFilter {
            unit_id: Some(unit_id),
            end_time: Some(time),
            ..Default::default()
        };
        let events = self.store.read_events(&filter).await?;

        let mut beds: BTreeMap<BedId, BedView> = BTreeMap::new();
        for event in &events {
            let Some(bed_id) = event.bed_id else { continue };
            let status = match event.event_type {
                EventType::BedAssignment => Some(BedStatus::Occupied),
                EventType::CleaningStart => Some(BedStatus::Cleaning),
                EventType::CleaningEnd | EventType::Discharge => Some(BedStatus::Empty),
                _ => None,
            };
            if let Some(status) = status {
                let patient_id = if status == BedStatus::Occupied {
                    event.patient_id
                } else {
                    None
                };
                beds.insert(
                    bed_id,
                    BedView {
                        bed_id,
                        status,
                        patient_id,
                    },
                );
            }
        }
        Ok(beds.into_values().collect())
    }

    /// Patient summary rows for `unit_id` (`GET /patients`), derived from
    /// `arrival`/`bed_assignment`/`discharge` events.
    pub async fn list_patients(&self, unit_id: Uuid) -> SimResult<Vec<PatientSummary>> {
        let filter = EventFilter {
            unit_id: Some(unit_id),
            ..Default::default()
        };
        let mut events = self.store.read_events(&filter).await?;
        events.sort_by_key(|e| e.timestamp);

        let mut summaries: BTreeMap<PatientId, PatientSummary> = BTreeMap::new();
        for event in &events {
            let Some(patient_id) = event.patient_id else { continue };
            let summary = summaries.entry(patient_id).or_insert(PatientSummary {
                patient_id,
                acuity: None,
                arrival_time: None,
                bed_id: None,
                discharged: false,
            });
            match event.event_type {
                EventType::Arrival => {
                    summary.arrival_time = Some(event.timestamp);
                    summary.acuity = event
                        .data
                        .get("acuity")
                        .and_then(|v| serde_json::from_value(v.clone()).ok());
                }
                EventType::BedAssignment => summary.bed_id = event.bed_id,
                EventType::Discharge => {
                    summary.discharged = true;
                    summary.bed_id = None;
                }
                _ => {}
            }
        }
        Ok(summaries.into_values().collect())
    }

    /// One patient's summary row (`GET /patients/{id}`).
    pub async fn patient_summary(&self, patient_id: PatientId) -> SimResult<PatientSummary> {
        let filter = EventFilter {
            patient_id: Some(patient_id),
            ..Default::default()
        };
        let events = self.store.read_events(&filter).await?;
        if events.is_empty() {
            return Err(SimError::NotFound(format!("patient {patient_id}")));
        }
        let unit_id = events[0].unit_id;
        self.list_patients(unit_id)
            .await?
            .into_iter()
            .find(|p| p.patient_id == patient_id)
            .ok_or_else(|| SimError::NotFound(format!("patient {patient_id}")))
    }

    /// Per-nurse current load for `unit_id` as of `time` (`GET /nurses`).
    pub async fn list_nurses(&self, time: Timestamp, unit_id: Uuid) -> SimResult<Vec<NurseView>> {
        let filter = EventFilter {
            unit_id: Some(unit_id),
            end_time: Some(time),
            ..Default::default()
        };
        let events = self.store.read_events(&filter).await?;

        let mut loads: BTreeMap<NurseId, BTreeSet<PatientId>> = BTreeMap::new();
        for event in &events {
            let (Some(nurse_id), Some(patient_id)) = (event.nurse_id, event.patient_id) else {
                continue;
            };
            match event.event_type {
                EventType::NurseAssignment => {
                    loads.entry(nurse_id).or_default().insert(patient_id);
                }
                EventType::Discharge => {
                    if let Some(load) = loads.get_mut(&nurse_id) {
                        load.remove(&patient_id);
                    }
                }
                _ => {}
            }
        }
        Ok(loads
            .into_iter()
            .map(|(nurse_id, patients)| NurseView {
                nurse_id,
                assigned_patient_ids: patients.into_iter().collect(),
            })
            .collect())
    }

    pub async fn summarize_bottlenecks(
        &self,
        start: Timestamp,
        end: Timestamp,
        scenario_id: Option<Uuid>,
    ) -> SimResult<BottleneckSummary> {
        let filter = EventFilter {
            event_type: Some(EventType::BedAssignment),
            start_time: Some(start),
            end_time: Some(end),
            scenario_id,
            ..Default::default()
        };
        let events = self.store.read_events(&filter).await?;

        let wait_minutes: Vec<f64> = events
            .iter()
            .filter_map(|e| e.data.get("wait_minutes").and_then(|v| v.as_f64()))
            .collect();

        let total_assignments = events.len();
        let avg_wait_minutes = if wait_minutes.is_empty() {
            0.0
        } else {
            wait_minutes.iter().sum::<f64>() / wait_minutes.len() as f64
        };
        let sla_breaches = wait_minutes
            .iter()
            .filter(|&&w| w > SLA_THRESHOLD_MINUTES)
            .count();

        let ranked = vec![RankedBottleneck {
            constraint: Constraint::BedAvailability,
            occurrences: total_assignments,
            impact_score: sla_breaches as f64 / total_assignments.max(1) as f64,
            avg_queue_length: None,
            description: Constraint::BedAvailability.description(),
        }];

        Ok(BottleneckSummary {
            total_assignments,
            avg_wait_minutes,
            sla_breaches,
            ranked,
            nurse_ratio_heuristic: NURSE_RATIO_HEURISTIC,
        })
    }

    /// `GET /metrics/kpi`: a point-in-time occupancy/staffing snapshot plus
    /// the ranked bottleneck list over the trailing 24 hours ending `time`.
    pub async fn kpi(&self, time: Timestamp, unit_id: Uuid) -> SimResult<KpiSummary> {
        let state = self.query_state(time, unit_id).await?;
        let window_start = time - 24 * 60 * 60 * 1000;
        let bottlenecks = self
            .summarize_bottlenecks(window_start, time, None)
            .await?
            .ranked;

        let total_beds = state.beds_occupied + state.beds_cleaning + state.beds_empty;
        let occupancy_pct = if total_beds == 0 {
            0.0
        } else {
            100.0 * state.beds_occupied as f64 / total_beds as f64
        };

        Ok(KpiSummary {
            unit_id,
            occupancy_pct,
            beds_occupied: state.beds_occupied,
            beds_cleaning: state.beds_cleaning,
            beds_empty: state.beds_empty,
            patients_waiting_for_bed: state.patients_waiting_for_bed,
            avg_patients_per_nurse: state.avg_patients_per_nurse,
            bottlenecks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_memory::MemoryStore;
    use crate::types::Acuity;
    use serde_json::json;
    use std::sync::Arc;

    fn event(
        unit_id: Uuid,
        timestamp: Timestamp,
        event_type: EventType,
        patient_id: Option<PatientId>,
        bed_id: Option<BedId>,
        nurse_id: Option<NurseId>,
        data: serde_json::Value,
    ) -> PersistedEvent {
        PersistedEvent {
            id: Uuid::new_v4(),
            timestamp,
            event_type,
            patient_id,
            unit_id,
            bed_id,
            nurse_id,
            data,
            scenario_id: None,
        }
    }

    #[tokio::test]
    async fn query_state_counts_occupied_and_waiting() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[
                event(unit_id, 100, EventType::AdmissionRequest, Some(1), None, None, json!(null)),
                event(unit_id, 200, EventType::AdmissionRequest, Some(2), None, None, json!(null)),
                event(
                    unit_id,
                    300,
                    EventType::BedAssignment,
                    Some(1),
                    Some(5),
                    Some(9),
                    json!({"wait_minutes": 10.0}),
                ),
                event(unit_id, 400, EventType::NurseAssignment, Some(1), Some(5), Some(9), json!(null)),
            ])
            .await
            .unwrap();

        let service = QueryService::new(store);
        let state = service.query_state(1_000, unit_id).await.unwrap();
        assert_eq!(state.beds_occupied, 1);
        assert_eq!(state.patients_waiting_for_bed, 1);
        assert_eq!(state.nurse_count, 1);
        assert_eq!(state.avg_patients_per_nurse, 1.0);
    }

    #[tokio::test]
    async fn patient_trace_computes_wait_and_total_time() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[
                event(unit_id, 0, EventType::Arrival, Some(1), None, None, json!(null)),
                event(unit_id, 600_000, EventType::BedAssignment, Some(1), Some(5), Some(9), json!(null)),
                event(unit_id, 900_000, EventType::NurseAssignment, Some(1), Some(5), Some(9), json!(null)),
                event(unit_id, 3_600_000, EventType::Discharge, Some(1), Some(5), Some(9), json!(null)),
            ])
            .await
            .unwrap();

        let service = QueryService::new(store);
        let trace = service.patient_trace(1).await.unwrap();
        assert_eq!(trace.handoffs, 1);
        assert_eq!(trace.wait_for_bed_minutes, Some(10.0));
        assert_eq!(trace.total_time_minutes, Some(60.0));
    }

    #[tokio::test]
    async fn patient_trace_missing_patient_is_not_found() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let service = QueryService::new(store);
        let err = service.patient_trace(999).await.unwrap_err();
        assert!(matches!(err, SimError::NotFound(_)));
    }

    #[tokio::test]
    async fn summarize_bottlenecks_counts_sla_breaches() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[
                event(
                    unit_id,
                    100,
                    EventType::BedAssignment,
                    Some(1),
                    Some(1),
                    None,
                    json!({"wait_minutes": 30.0}),
                ),
                event(
                    unit_id,
                    200,
                    EventType::BedAssignment,
                    Some(2),
                    Some(2),
                    None,
                    json!({"wait_minutes": 90.0}),
                ),
            ])
            .await
            .unwrap();

        let service = QueryService::new(store);
        let summary = service.summarize_bottlenecks(0, 1_000, None).await.unwrap();
        assert_eq!(summary.total_assignments, 2);
        assert_eq!(summary.sla_breaches, 1);
        assert_eq!(summary.avg_wait_minutes, 60.0);
        assert!(!summary.nurse_ratio_heuristic.is_empty());
    }

    #[tokio::test]
    async fn list_units_returns_distinct_unit_ids() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_a = Uuid::new_v4();
        let unit_b = Uuid::new_v4();
        store
            .append_events(&[
                event(unit_a, 0, EventType::Arrival, Some(1), None, None, json!(null)),
                event(unit_a, 10, EventType::Arrival, Some(2), None, None, json!(null)),
                event(unit_b, 0, EventType::Arrival, Some(3), None, None, json!(null)),
            ])
            .await
            .unwrap();

        let service = QueryService::new(store);
        let units = service.list_units().await.unwrap();
        assert_eq!(units.len(), 2);
        assert!(units.contains(&unit_a));
        assert!(units.contains(&unit_b));
    }

    #[tokio::test]
    async fn list_beds_tracks_assignment_then_cleaning_then_empty() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[
                event(unit_id, 0, EventType::BedAssignment, Some(1), Some(5), None, json!(null)),
                event(unit_id, 100, EventType::Discharge, Some(1), Some(5), None, json!(null)),
                event(unit_id, 110, EventType::CleaningStart, None, Some(5), None, json!(null)),
            ])
            .await
            .unwrap();

        let service = QueryService::new(store);
        let beds = service.list_beds(50, unit_id).await.unwrap();
        assert_eq!(beds.len(), 1);
        assert_eq!(beds[0].status, BedStatus::Occupied);
        assert_eq!(beds[0].patient_id, Some(1));

        let beds = service.list_beds(200, unit_id).await.unwrap();
        assert_eq!(beds[0].status, BedStatus::Cleaning);
    }

    #[tokio::test]
    async fn list_patients_marks_acuity_and_discharge() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[
                event(unit_id, 0, EventType::Arrival, Some(1), None, None, json!({"acuity": "high"})),
                event(unit_id, 50, EventType::BedAssignment, Some(1), Some(3), None, json!(null)),
                event(unit_id, 500, EventType::Discharge, Some(1), Some(3), None, json!(null)),
            ])
            .await
            .unwrap();

        let service = QueryService::new(store);
        let patients = service.list_patients(unit_id).await.unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].acuity, Some(Acuity::High));
        assert!(patients[0].discharged);
        assert_eq!(patients[0].bed_id, None);

        let single = service.patient_summary(1).await.unwrap();
        assert_eq!(single.patient_id, 1);
    }

    #[tokio::test]
    async fn list_nurses_reflects_assignment_and_release() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[
                event(unit_id, 0, EventType::NurseAssignment, Some(1), Some(5), Some(9), json!(null)),
                event(unit_id, 10, EventType::NurseAssignment, Some(2), Some(6), Some(9), json!(null)),
            ])
            .await
            .unwrap();

        let service = QueryService::new(Arc::clone(&store));
        let nurses = service.list_nurses(20, unit_id).await.unwrap();
        assert_eq!(nurses.len(), 1);
        assert_eq!(nurses[0].assigned_patient_ids.len(), 2);

        store
            .append_events(&[event(unit_id, 30, EventType::Discharge, Some(1), Some(5), Some(9), json!(null))])
            .await
            .unwrap();
        let nurses = service.list_nurses(40, unit_id).await.unwrap();
        assert_eq!(nurses[0].assigned_patient_ids, vec![2]);
    }

    #[tokio::test]
    async fn kpi_combines_occupancy_and_bottlenecks() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[
                event(
                    unit_id,
                    100,
                    EventType::BedAssignment,
                    Some(1),
                    Some(1),
                    None,
                    json!({"wait_minutes": 90.0}),
                ),
            ])
            .await
            .unwrap();

        let service = QueryService::new(store);
        let kpi = service.kpi(200, unit_id).await.unwrap();
        assert_eq!(kpi.beds_occupied, 1);
        assert!((kpi.occupancy_pct - 100.0).abs() < 1e-9);
        assert!(!kpi.bottlenecks.is_empty());
    }
}
