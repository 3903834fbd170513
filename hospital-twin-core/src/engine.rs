//! Discrete-event simulation engine. Owns the clock, dispatches events to
//! per-kind handlers, and drives admission/imaging/consult/discharge/cleaning
//! logic. The engine has no internal suspension points: `run`
//! is synchronous and single-threaded over its own virtual clock, which is
//! what gives determinism for a fixed `(scenario, seed)` pair.

use crate::error::{SimError, SimResult};
use crate::queue::EventQueue;
use crate::resources::{BedPool, NursePool, ResourceCounter};
use crate::rng::SimRng;
use crate::types::*;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// `requires_imaging ~ Bernoulli(0.4)`, `requires_consult ~ Bernoulli(0.25)`.
const IMAGING_PROBABILITY: f64 = 0.4;
const CONSULT_PROBABILITY: f64 = 0.25;

/// Everything a completed (or partially completed, on fault) run produces.
pub struct EngineOutput {
    pub bundle: ResultBundle,
    pub events: Vec<PersistedEvent>,
}

pub struct SimulationEngine {
    params: ScenarioParameters,
    unit_id: Uuid,
    scenario_id: Option<Uuid>,

    rng: SimRng,
    queue: EventQueue,
    beds: BedPool,
    nurses: NursePool,
    imaging: ResourceCounter,
    #[allow(dead_code)] // mirrors original_source: declared, never acquired (see DESIGN.md)
    transport: ResourceCounter,

    patients: BTreeMap<PatientId, Patient>,
    next_patient_id: PatientId,

    now: VirtualMinutes,
    last_sample: VirtualMinutes,
    last_progress_pct: u8,

    bottleneck_log: Vec<BottleneckRecord>,
    samples: Vec<TimeSeriesSample>,
    outcomes: Vec<PatientOutcome>,
    events_out: Vec<PersistedEvent>,
}

impl SimulationEngine {
    pub fn new(
        params: ScenarioParameters,
        seed: u64,
        unit_id: Uuid,
        scenario_id: Option<Uuid>,
    ) -> SimResult<Self> {
        validate_parameters(&params)?;

        let mut engine = Self {
            beds: BedPool::new(params.beds_available),
            nurses: NursePool::new(params.nurse_count.day),
            imaging: ResourceCounter::new(params.imaging_slots()),
            transport: ResourceCounter::new(params.transport_slots()),
            rng: SimRng::new(seed),
            queue: EventQueue::new(),
            patients: BTreeMap::new(),
            next_patient_id: 1,
            now: 0.0,
            last_sample: 0.0,
            last_progress_pct: 0,
            bottleneck_log: Vec::new(),
            samples: Vec::new(),
            outcomes: Vec::new(),
            events_out: Vec::new(),
            unit_id,
            scenario_id,
            params,
        };
        engine.generate_arrivals();
        Ok(engine)
    }

    /// Pre-generate all arrivals for `[0, 24h)`.
    fn generate_arrivals(&mut self) {
        let acuities: Vec<Acuity> = self.params.acuity_mix.keys().copied().collect();
        let weights: Vec<f64> = acuities.iter().map(|a| self.params.acuity_mix[a]).collect();
        let mean_inter_arrival = 60.0 / self.params.arrivals_per_hour();

        let mut t = 0.0;
        loop {
            t += self.rng.exp(mean_inter_arrival);
            if t >= HORIZON_MINUTES {
                break;
            }
            let acuity = *self.rng.choice(&acuities, &weights);
            let requires_imaging = self.rng.bernoulli(IMAGING_PROBABILITY);
            let requires_consult = self.rng.bernoulli(CONSULT_PROBABILITY);
            self.queue.push(SimEvent {
                time: t,
                sequence: 0,
                patient_id: None,
                kind: SimEventKind::Arrival {
                    acuity,
                    requires_imaging,
                    requires_consult,
                },
            });
        }
    }

    /// Drain the event queue to completion, sampling every 15 virtual
    /// minutes and reporting integer-percent progress. Bounded by
    /// `max_wall_time` of real time.
    pub fn run(
        mut self,
        max_wall_time: Duration,
        mut progress: impl FnMut(u8),
    ) -> SimResult<EngineOutput> {
        let started = Instant::now();
        while let Some(event) = self.queue.pop() {
            if started.elapsed() > max_wall_time {
                return Err(SimError::Timeout(format!(
                    "simulation exceeded {:?} wall-clock bound",
                    max_wall_time
                )));
            }
            self.now = event.time;
            self.dispatch(event)?;
            self.sample_if_due();
            self.report_progress(&mut progress);
        }
        // Final sample so the series covers the full horizon even if the
        // last event fired well before 1440.
        self.now = self.now.max(HORIZON_MINUTES);
        self.sample_if_due();
        progress(100);

        let bundle = crate::metrics::aggregate(&self.outcomes, &self.samples, &self.bottleneck_log);
        Ok(EngineOutput {
            bundle,
            events: self.events_out,
        })
    }

    fn report_progress(&mut self, progress: &mut impl FnMut(u8)) {
        let pct = ((100.0 * self.now / HORIZON_MINUTES).floor().clamp(0.0, 100.0)) as u8;
        if pct > self.last_progress_pct {
            self.last_progress_pct = pct;
            progress(pct);
        }
    }

    fn sample_if_due(&mut self) {
        while self.now - self.last_sample >= SAMPLE_INTERVAL_MINUTES {
            self.last_sample += SAMPLE_INTERVAL_MINUTES;
            let occupied = self.beds.occupied_count();
            let total = self.beds.len().max(1);
            self.samples.push(TimeSeriesSample {
                time: self.last_sample,
                occupancy_pct: 100.0 * occupied as f64 / total as f64,
                bed_queue: self.beds.wait_queue.len(),
                imaging_queue: self.imaging.queue_len(),
                nurse_load: self.nurses.mean_load(),
            });
        }
    }

    fn dispatch(&mut self, event: SimEvent) -> SimResult<()> {
        match event.kind {
            SimEventKind::Arrival {
                acuity,
                requires_imaging,
                requires_consult,
            } => self.handle_arrival(event.time, acuity, requires_imaging, requires_consult),
            SimEventKind::TriageEnd => self.handle_triage_end(event.patient_id.unwrap()),
            SimEventKind::ImagingRequest => self.handle_imaging_request(event.patient_id.unwrap()),
            SimEventKind::ImagingEnd => self.handle_imaging_end(event.patient_id.unwrap()),
            SimEventKind::ConsultRequest => self.handle_consult_request(event.patient_id.unwrap()),
            SimEventKind::ConsultEnd => self.handle_consult_end(event.patient_id.unwrap()),
            SimEventKind::Discharge => self.handle_discharge(event.patient_id.unwrap()),
            SimEventKind::CleaningEnd { bed_id } => self.handle_cleaning_end(bed_id),
        }
        Ok(())
    }

    fn emit(&mut self, event_type: EventType, patient_id: Option<PatientId>, bed_id: Option<BedId>,
        nurse_id: Option<NurseId>, data: serde_json::Value) {
        self.events_out.push(PersistedEvent {
            id: Uuid::new_v4(),
            timestamp: (self.now * 60_000.0) as Timestamp,
            event_type,
            patient_id,
            unit_id: self.unit_id,
            bed_id,
            nurse_id,
            data,
            scenario_id: self.scenario_id,
        });
    }

    // ── Handlers ─────────────────────────────────────────────

    fn handle_arrival(
        &mut self,
        time: VirtualMinutes,
        acuity: Acuity,
        requires_imaging: bool,
        requires_consult: bool,
    ) {
        let id = self.next_patient_id;
        self.next_patient_id += 1;
        let mut patient = Patient::new(id, acuity, time);
        patient.requires_imaging = requires_imaging;
        patient.requires_consult = requires_consult;
        self.patients.insert(id, patient);
        self.emit(EventType::Arrival, Some(id), None, None, serde_json::json!({"acuity": acuity}));

        let triage_duration = self.rng.int_range(5, 14) as f64;
        self.queue.push(SimEvent {
            time: time + triage_duration,
            sequence: 0,
            patient_id: Some(id),
            kind: SimEventKind::TriageEnd,
        });
    }

    fn handle_triage_end(&mut self, patient_id: PatientId) {
        let now = self.now;
        if let Some(p) = self.patients.get_mut(&patient_id) {
            p.triage_end = Some(now);
        }
        self.emit(EventType::Triage, Some(patient_id), None, None, serde_json::Value::Null);
        self.request_bed(patient_id);
    }

    /// Isolation preference is applied on every acquisition, not just a
    /// best-effort fallback. We treat `critical` acuity as the
    /// isolation-preferring population — the closest proxy available
    /// without an explicit `is_isolation` input field in the scenario.
    fn request_bed(&mut self, patient_id: PatientId) {
        let now = self.now;
        let prefer_isolation = self
            .patients
            .get(&patient_id)
            .map(|p| p.acuity == Acuity::Critical)
            .unwrap_or(false);

        self.emit(
            EventType::AdmissionRequest,
            Some(patient_id),
            None,
            None,
            serde_json::Value::Null,
        );

        match self.beds.acquire(now, prefer_isolation) {
            Some(bed_id) => self.admit(patient_id, bed_id),
            None => {
                self.beds.wait_queue.push_back(patient_id);
                self.log_bottleneck(Constraint::BedAvailability, Some(patient_id), Some(self.beds.wait_queue.len()));
            }
        }
    }

    /// Admission sequence, invoked synchronously at bed assignment time.
    fn admit(&mut self, patient_id: PatientId, bed_id: BedId) {
        let now = self.now;
        self.beds.assign_patient(bed_id, patient_id);
        let nurse_id = self.nurses.assign(patient_id);
        if nurse_id.is_none() {
            self.log_bottleneck(Constraint::NurseStaffing, Some(patient_id), None);
        }

        let (acuity, requires_imaging, requires_consult) = {
            let p = self.patients.get_mut(&patient_id).expect("patient exists");
            p.bed_id = Some(bed_id);
            p.bed_assigned = Some(now);
            p.nurse_id = nurse_id;
            (p.acuity, p.requires_imaging, p.requires_consult)
        };

        let wait_minutes = now - self.patients[&patient_id].arrival_time;
        self.emit(
            EventType::BedAssignment,
            Some(patient_id),
            Some(bed_id),
            nurse_id,
            serde_json::json!({"wait_minutes": wait_minutes}),
        );
        if let Some(nid) = nurse_id {
            self.emit(EventType::NurseAssignment, Some(patient_id), Some(bed_id), Some(nid), serde_json::Value::Null);
        }

        if requires_imaging {
            let delay = self.rng.int_range(15, 44) as f64;
            self.queue.push(SimEvent {
                time: now + delay,
                sequence: 0,
                patient_id: Some(patient_id),
                kind: SimEventKind::ImagingRequest,
            });
        }
        if requires_consult {
            let delay = self.rng.int_range(15, 44) as f64;
            self.queue.push(SimEvent {
                time: now + delay,
                sequence: 0,
                patient_id: Some(patient_id),
                kind: SimEventKind::ConsultRequest,
            });
        }

        let (lo, hi) = acuity.los_range_minutes();
        let los = self.rng.int_range(lo as i64, hi as i64) as f64;
        let discharge_time = now + los;
        if discharge_time < HORIZON_MINUTES {
            self.queue.push(SimEvent {
                time: discharge_time,
                sequence: 0,
                patient_id: Some(patient_id),
                kind: SimEventKind::Discharge,
            });
        }
    }

    fn handle_imaging_request(&mut self, patient_id: PatientId) {
        let now = self.now;
        if let Some(p) = self.patients.get_mut(&patient_id) {
            p.imaging_request = Some(now);
        }
        self.emit(EventType::ImagingRequest, Some(patient_id), None, None, serde_json::Value::Null);

        if self.imaging.try_acquire() {
            self.start_imaging(patient_id, now);
        } else {
            self.imaging.wait_queue.push_back(patient_id);
            self.log_bottleneck(Constraint::ImagingCapacity, Some(patient_id), Some(self.imaging.queue_len()));
        }
    }

    fn start_imaging(&mut self, patient_id: PatientId, now: VirtualMinutes) {
        if let Some(p) = self.patients.get_mut(&patient_id) {
            p.imaging_start = Some(now);
        }
        self.emit(EventType::ImagingStart, Some(patient_id), None, None, serde_json::Value::Null);
        let duration = self.rng.int_range(20, 59) as f64;
        self.queue.push(SimEvent {
            time: now + duration,
            sequence: 0,
            patient_id: Some(patient_id),
            kind: SimEventKind::ImagingEnd,
        });
    }

    fn handle_imaging_end(&mut self, patient_id: PatientId) {
        let now = self.now;
        if let Some(p) = self.patients.get_mut(&patient_id) {
            p.imaging_end = Some(now);
        }
        self.emit(EventType::ImagingEnd, Some(patient_id), None, None, serde_json::Value::Null);

        if let Some(next_patient) = self.imaging.release() {
            // Corrected last note: stamp imaging_start on the
            // dequeued waiter before scheduling its imaging_end.
            self.start_imaging(next_patient, now);
        }
    }

    fn handle_consult_request(&mut self, patient_id: PatientId) {
        self.emit(EventType::ConsultRequest, Some(patient_id), None, None, serde_json::Value::Null);
        self.emit(EventType::ConsultStart, Some(patient_id), None, None, serde_json::Value::Null);
        let duration = self.rng.int_range(20, 59) as f64;
        self.queue.push(SimEvent {
            time: self.now + duration,
            sequence: 0,
            patient_id: Some(patient_id),
            kind: SimEventKind::ConsultEnd,
        });
    }

    fn handle_consult_end(&mut self, patient_id: PatientId) {
        self.emit(EventType::ConsultEnd, Some(patient_id), None, None, serde_json::Value::Null);
    }

    fn handle_discharge(&mut self, patient_id: PatientId) {
        let now = self.now;
        let (bed_id, nurse_id, outcome) = {
            let p = self.patients.get_mut(&patient_id).expect("patient exists");
            p.discharge = Some(now);
            let wait_time_minutes = p.bed_assigned.map(|t| t - p.arrival_time);
            let los_minutes = p.discharge.map(|t| t - p.arrival_time);
            let imaging_delay_minutes = match (p.imaging_start, p.bed_assigned) {
                (Some(start), Some(assigned)) => Some(start - assigned),
                _ => None,
            };
            (
                p.bed_id,
                p.nurse_id,
                PatientOutcome {
                    patient_id,
                    acuity: p.acuity,
                    wait_time_minutes,
                    los_minutes,
                    imaging_delay_minutes,
                },
            )
        };

        if let Some(nid) = nurse_id {
            self.nurses.release(nid, patient_id);
        }

        if let Some(bid) = bed_id {
            self.beds.begin_cleaning(bid);
            self.emit(EventType::CleaningStart, Some(patient_id), Some(bid), None, serde_json::Value::Null);
            let cleaning_duration = self.rng.int_range(15, 29) as f64;
            self.queue.push(SimEvent {
                time: now + cleaning_duration,
                sequence: 0,
                patient_id: None,
                kind: SimEventKind::CleaningEnd { bed_id: bid },
            });
        }

        self.emit(EventType::Discharge, Some(patient_id), bed_id, nurse_id, serde_json::Value::Null);
        self.outcomes.push(outcome);
    }

    fn handle_cleaning_end(&mut self, bed_id: BedId) {
        let now = self.now;
        self.beds.end_cleaning(bed_id, now);
        self.emit(EventType::CleaningEnd, None, Some(bed_id), None, serde_json::Value::Null);

        if let Some(patient_id) = self.beds.wait_queue.pop_front() {
            self.beds.occupy(bed_id);
            self.admit(patient_id, bed_id);
        }
    }

    fn log_bottleneck(&mut self, constraint: Constraint, patient_id: Option<PatientId>, queue_length: Option<usize>) {
        self.bottleneck_log.push(BottleneckRecord {
            time: self.now,
            constraint,
            patient_id,
            queue_length,
            description: None,
        });
    }
}

fn validate_parameters(p: &ScenarioParameters) -> SimResult<()> {
    if !(0.5..=3.0).contains(&p.arrival_multiplier) {
        return Err(SimError::InvalidParameter(format!(
            "arrival_multiplier {} out of range [0.5, 3.0]",
            p.arrival_multiplier
        )));
    }
    if !(1..=100).contains(&p.beds_available) {
        return Err(SimError::InvalidParameter(format!(
            "beds_available {} out of range [1, 100]",
            p.beds_available
        )));
    }
    if !(0.2..=5.0).contains(&p.imaging_capacity) {
        return Err(SimError::InvalidParameter(format!(
            "imaging_capacity {} out of range [0.2, 5.0]",
            p.imaging_capacity
        )));
    }
    if !(0.2..=5.0).contains(&p.transport_capacity) {
        return Err(SimError::InvalidParameter(format!(
            "transport_capacity {} out of range [0.2, 5.0]",
            p.transport_capacity
        )));
    }
    let sum: f64 = p.acuity_mix.values().sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(SimError::InvalidParameter(format!(
            "acuity_mix probabilities must sum to 1.0, got {sum}"
        )));
    }
    Ok(())
}
