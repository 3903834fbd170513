//! In-memory `SimulationStore`, the default backend for local runs and
//! tests. Mirrors the teacher's `MemoryStore`: a single `RwLock<Inner>`
//! guarding plain collections, one lock acquisition per call.

use crate::error::{SimError, SimResult};
use crate::store::{EventFilter, SimulationStore};
use crate::types::{PersistedEvent, Run, Scenario};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

struct Inner {
    scenarios: HashMap<Uuid, Scenario>,
    runs: HashMap<Uuid, Run>,
    events: Vec<PersistedEvent>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                scenarios: HashMap::new(),
                runs: HashMap::new(),
                events: Vec::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimulationStore for MemoryStore {
    async fn save_scenario(&self, scenario: &Scenario) -> SimResult<()> {
        let mut w = self.inner.write().await;
        w.scenarios.insert(scenario.id, scenario.clone());
        Ok(())
    }

    async fn load_scenario(&self, id: Uuid) -> SimResult<Option<Scenario>> {
        let r = self.inner.read().await;
        Ok(r.scenarios.get(&id).cloned())
    }

    async fn list_scenarios(&self) -> SimResult<Vec<Scenario>> {
        let r = self.inner.read().await;
        Ok(r.scenarios.values().cloned().collect())
    }

    async fn delete_scenario(&self, id: Uuid) -> SimResult<()> {
        let mut w = self.inner.write().await;
        match w.scenarios.get(&id) {
            Some(s) if s.is_baseline => Err(SimError::StateViolation(
                "baseline scenario cannot be deleted".to_string(),
            )),
            Some(_) => {
                w.scenarios.remove(&id);
                Ok(())
            }
            None => Err(SimError::NotFound(format!("scenario {id}"))),
        }
    }

    async fn save_run(&self, run: &Run) -> SimResult<()> {
        let mut w = self.inner.write().await;
        w.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn load_run(&self, id: Uuid) -> SimResult<Option<Run>> {
        let r = self.inner.read().await;
        Ok(r.runs.get(&id).cloned())
    }

    async fn list_runs_for_scenario(&self, scenario_id: Uuid) -> SimResult<Vec<Run>> {
        let r = self.inner.read().await;
        Ok(r.runs
            .values()
            .filter(|run| run.scenario_id == scenario_id)
            .cloned()
            .collect())
    }

    async fn update_run_progress(&self, id: Uuid, progress: u8) -> SimResult<()> {
        let mut w = self.inner.write().await;
        let run = w
            .runs
            .get_mut(&id)
            .ok_or_else(|| SimError::NotFound(format!("run {id}")))?;
        run.progress = progress;
        Ok(())
    }

    async fn append_events(&self, events: &[PersistedEvent]) -> SimResult<()> {
        let mut w = self.inner.write().await;
        w.events.extend_from_slice(events);
        Ok(())
    }

    async fn read_events(&self, filter: &EventFilter) -> SimResult<Vec<PersistedEvent>> {
        let r = self.inner.read().await;
        let mut matched: Vec<PersistedEvent> = r
            .events
            .iter()
            .filter(|e| match filter.unit_id {
                Some(want) => want == e.unit_id,
                None => true,
            })
            .filter(|e| match (filter.patient_id, e.patient_id) {
                (Some(want), Some(got)) => want == got,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|e| match filter.event_type {
                Some(want) => want == e.event_type,
                None => true,
            })
            .filter(|e| match filter.start_time {
                Some(start) => e.timestamp >= start,
                None => true,
            })
            .filter(|e| match filter.end_time {
                Some(end) => e.timestamp <= end,
                None => true,
            })
            .filter(|e| match filter.scenario_id {
                Some(want) => e.scenario_id == Some(want),
                None => true,
            })
            .cloned()
            .collect();

        matched.sort_by_key(|e| e.timestamp);

        let offset = filter.offset.unwrap_or(0) as usize;
        let matched = if offset >= matched.len() {
            Vec::new()
        } else {
            matched.split_off(offset)
        };

        Ok(match filter.limit {
            Some(limit) => matched.into_iter().take(limit as usize).collect(),
            None => matched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Acuity, EventType, NurseShiftCounts, RunStatus, ScenarioParameters};
    use std::collections::BTreeMap;

    fn scenario(id: Uuid, is_baseline: bool) -> Scenario {
        Scenario {
            id,
            name: "test".to_string(),
            parameters: ScenarioParameters {
                arrival_multiplier: 1.0,
                acuity_mix: BTreeMap::from([(Acuity::Low, 1.0)]),
                beds_available: 10,
                nurse_count: NurseShiftCounts {
                    day: 3,
                    evening: 3,
                    night: 2,
                },
                imaging_capacity: 1.0,
                transport_capacity: 1.0,
                seed: Some(7),
            },
            is_baseline,
            created_at: 0,
        }
    }

    fn event(id: Uuid, timestamp: i64, patient_id: Option<u32>) -> PersistedEvent {
        PersistedEvent {
            id,
            timestamp,
            event_type: EventType::Arrival,
            patient_id,
            unit_id: Uuid::nil(),
            bed_id: None,
            nurse_id: None,
            data: serde_json::json!({}),
            scenario_id: None,
        }
    }

    #[tokio::test]
    async fn scenario_round_trip() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.save_scenario(&scenario(id, false)).await.unwrap();
        let loaded = store.load_scenario(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(store.list_scenarios().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn baseline_scenario_cannot_be_deleted() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.save_scenario(&scenario(id, true)).await.unwrap();
        let err = store.delete_scenario(id).await.unwrap_err();
        assert!(matches!(err, SimError::StateViolation(_)));
    }

    #[tokio::test]
    async fn non_baseline_scenario_deletes_cleanly() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.save_scenario(&scenario(id, false)).await.unwrap();
        store.delete_scenario(id).await.unwrap();
        assert!(store.load_scenario(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn run_progress_updates_in_place() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();
        let scenario_id = Uuid::new_v4();
        let mut run = Run::new_pending(run_id, scenario_id);
        run.status = RunStatus::Running;
        store.save_run(&run).await.unwrap();

        store.update_run_progress(run_id, 42).await.unwrap();
        let loaded = store.load_run(run_id).await.unwrap().unwrap();
        assert_eq!(loaded.progress, 42);

        let runs = store.list_runs_for_scenario(scenario_id).await.unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn event_filter_applies_patient_and_time_bounds() {
        let store = MemoryStore::new();
        store
            .append_events(&[
                event(Uuid::new_v4(), 10, Some(1)),
                event(Uuid::new_v4(), 20, Some(2)),
                event(Uuid::new_v4(), 30, Some(1)),
            ])
            .await
            .unwrap();

        let filter = EventFilter {
            patient_id: Some(1),
            ..Default::default()
        };
        let matched = store.read_events(&filter).await.unwrap();
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].timestamp, 10);
        assert_eq!(matched[1].timestamp, 30);

        let filter = EventFilter {
            start_time: Some(15),
            end_time: Some(25),
            ..Default::default()
        };
        let matched = store.read_events(&filter).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].timestamp, 20);
    }

    #[tokio::test]
    async fn event_filter_paginates_with_limit_and_offset() {
        let store = MemoryStore::new();
        store
            .append_events(&[
                event(Uuid::new_v4(), 1, None),
                event(Uuid::new_v4(), 2, None),
                event(Uuid::new_v4(), 3, None),
            ])
            .await
            .unwrap();

        let filter = EventFilter {
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        };
        let matched = store.read_events(&filter).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].timestamp, 2);
    }
}
