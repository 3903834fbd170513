//! Replay streamer. Advances a virtual cursor in 60-second
//! steps, reading persisted events per step and emitting a delta to a
//! subscriber. The control side is polled non-blockingly each tick — this
//! mirrors the teacher's `TaskQueueListener::run`, which likewise loops on
//! its own work (there, draining a result queue; here, advancing the
//! cursor) while checking a `watch`/`mpsc` control signal without ever
//! parking on it.

use crate::error::SimResult;
use crate::store::{EventFilter, SimulationStore};
use crate::types::{
    BedChange, BedStatus, EventMarker, EventType, PersistedEvent, ReplayControl, ReplayDelta,
    ReplayFrame, ReplayMetricsSnapshot, Timestamp,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Tick granularity: 60 virtual seconds, expressed in the epoch-ms unit
/// `Timestamp` uses everywhere else.
const TICK_MS: Timestamp = 60_000;

/// Replay horizon: 24 hours from `start_time`.
const HORIZON_MS: Timestamp = 24 * 60 * 60 * 1000;

/// Real-time interval the loop waits on while paused before rechecking the
/// control channel.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ReplayStreamer {
    store: Arc<dyn SimulationStore>,
    /// Disabled in tests that drive `speed = ∞` via a dedicated test
    /// constructor: ticks are computed and sent without any real-time sleep.
    real_time_sleep: bool,
}

impl ReplayStreamer {
    pub fn new(store: Arc<dyn SimulationStore>) -> Self {
        Self {
            store,
            real_time_sleep: true,
        }
    }

    /// Test-only constructor that disables the `1/speed` real-time sleep,
    /// standing in for the "speed = ∞" test hook spec.md §8 describes.
    #[cfg(test)]
    pub fn for_testing(store: Arc<dyn SimulationStore>) -> Self {
        Self {
            store,
            real_time_sleep: false,
        }
    }

    /// Drive the replay loop until `stop`, subscriber disconnect (the tick
    /// sender closes), or horizon exhaustion. Intended to be spawned by the
    /// caller (the `/api/ws/replay` handler bridges inbound WS frames onto
    /// `control_rx` and outbound `ReplayFrame`s from `tick_tx` back onto the
    /// socket).
    pub async fn run(
        &self,
        unit_id: Uuid,
        start_time: Timestamp,
        initial_speed: f64,
        tick_tx: mpsc::Sender<ReplayFrame>,
        mut control_rx: mpsc::Receiver<ReplayControl>,
    ) {
        let mut t = start_time;
        let mut speed = initial_speed.clamp(0.1, 10.0);
        let mut paused = false;
        let mut bed_state: HashMap<u32, (BedStatus, Option<u32>)> = HashMap::new();

        loop {
            match control_rx.try_recv() {
                Ok(ReplayControl::Pause) => paused = true,
                Ok(ReplayControl::Play) => paused = false,
                Ok(ReplayControl::Seek(new_t)) => t = new_t,
                Ok(ReplayControl::Speed(new_speed)) => speed = new_speed.clamp(0.1, 10.0),
                Ok(ReplayControl::Stop) => {
                    debug!(%unit_id, "replay stream stopped by client");
                    return;
                }
                Err(mpsc::error::TryRecvError::Empty) => {}
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!(%unit_id, "replay control channel disconnected");
                    return;
                }
            }

            if paused {
                tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
                continue;
            }

            if t - start_time >= HORIZON_MS {
                let _ = tick_tx.send(ReplayFrame::Complete).await;
                return;
            }

            match self.compute_tick(unit_id, t, &mut bed_state).await {
                Ok(delta) => {
                    if tick_tx
                        .send(ReplayFrame::Tick { timestamp: t, delta })
                        .await
                        .is_err()
                    {
                        debug!(%unit_id, "replay subscriber disconnected");
                        return;
                    }
                }
                Err(e) => {
                    warn!(%unit_id, error = %e, "replay tick failed");
                    let _ = tick_tx
                        .send(ReplayFrame::Error {
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
            }

            t += TICK_MS;

            if self.real_time_sleep {
                tokio::time::sleep(Duration::from_secs_f64(1.0 / speed)).await;
            }
        }
    }

    async fn compute_tick(
        &self,
        unit_id: Uuid,
        t: Timestamp,
        bed_state: &mut HashMap<u32, (BedStatus, Option<u32>)>,
    ) -> SimResult<ReplayDelta> {
        let filter = EventFilter {
            unit_id: Some(unit_id),
            start_time: Some(t - TICK_MS),
            end_time: Some(t),
            ..Default::default()
        };
        let events = self.store.read_events(&filter).await?;

        let bed_changes = derive_bed_changes(&events, bed_state);
        let event_markers = events.iter().map(to_marker).collect();

        let occupied = bed_state
            .values()
            .filter(|(status, _)| *status == BedStatus::Occupied)
            .count();
        let occupancy_pct = if bed_state.is_empty() {
            0.0
        } else {
            100.0 * occupied as f64 / bed_state.len() as f64
        };

        Ok(ReplayDelta {
            bed_changes,
            event_markers,
            metrics: ReplayMetricsSnapshot {
                occupancy_pct,
                average_los_hours: None,
                average_time_to_bed_minutes: None,
                sla_breaches: None,
            },
        })
    }
}

fn to_marker(event: &PersistedEvent) -> EventMarker {
    EventMarker {
        id: event.id,
        event_type: event.event_type,
        timestamp: event.timestamp,
        patient_id: event.patient_id,
        bed_id: event.bed_id,
        data: event.data.clone(),
    }
}

/// Apply the bed-status transitions in spec.md §4.7 step 3, updating
/// `bed_state` and returning the changes this window produced.
fn derive_bed_changes(
    events: &[PersistedEvent],
    bed_state: &mut HashMap<u32, (BedStatus, Option<u32>)>,
) -> Vec<BedChange> {
    let mut changes = Vec::new();
    for event in events {
        let Some(bed_id) = event.bed_id else { continue };
        let (status, patient_id) = match event.event_type {
            EventType::BedAssignment => (BedStatus::Occupied, event.patient_id),
            EventType::Discharge => (BedStatus::Empty, None),
            EventType::CleaningStart => (BedStatus::Cleaning, None),
            EventType::CleaningEnd => (BedStatus::Empty, None),
            _ => continue,
        };
        bed_state.insert(bed_id, (status, patient_id));
        changes.push(BedChange {
            bed_id,
            status,
            patient_id,
        });
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_memory::MemoryStore;
    use serde_json::json;

    fn event(
        unit_id: Uuid,
        timestamp: Timestamp,
        event_type: EventType,
        bed_id: Option<u32>,
        patient_id: Option<u32>,
    ) -> PersistedEvent {
        PersistedEvent {
            id: Uuid::new_v4(),
            timestamp,
            event_type,
            patient_id,
            unit_id,
            bed_id,
            nurse_id: None,
            data: json!({}),
            scenario_id: None,
        }
    }

    #[tokio::test]
    async fn tick_delta_assigns_then_empties_a_bed() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        store
            .append_events(&[event(
                unit_id,
                1_000,
                EventType::BedAssignment,
                Some(1),
                Some(7),
            )])
            .await
            .unwrap();

        let streamer = ReplayStreamer::for_testing(Arc::clone(&store));
        let mut bed_state = HashMap::new();
        let delta = streamer.compute_tick(unit_id, 1_000, &mut bed_state).await.unwrap();
        assert_eq!(delta.bed_changes.len(), 1);
        assert_eq!(delta.bed_changes[0].status, BedStatus::Occupied);
        assert!((delta.metrics.occupancy_pct - 100.0).abs() < 1e-9);

        store
            .append_events(&[event(unit_id, 1_500, EventType::Discharge, Some(1), None)])
            .await
            .unwrap();
        let delta = streamer.compute_tick(unit_id, 61_000, &mut bed_state).await.unwrap();
        assert_eq!(delta.bed_changes[0].status, BedStatus::Empty);
        assert!((delta.metrics.occupancy_pct - 0.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stop_control_message_ends_the_stream_immediately() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        let streamer = ReplayStreamer::for_testing(store);

        let (tick_tx, mut tick_rx) = mpsc::channel(8);
        let (control_tx, control_rx) = mpsc::channel(8);
        control_tx.send(ReplayControl::Stop).await.unwrap();

        streamer.run(unit_id, 0, 1.0, tick_tx, control_rx).await;
        assert!(tick_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn horizon_exhaustion_sends_complete() {
        let store: Arc<dyn SimulationStore> = Arc::new(MemoryStore::new());
        let unit_id = Uuid::new_v4();
        let streamer = ReplayStreamer::for_testing(store);

        let (tick_tx, mut tick_rx) = mpsc::channel(4096);
        let (_control_tx, control_rx) = mpsc::channel(8);

        streamer.run(unit_id, 0, 10.0, tick_tx, control_rx).await;

        let mut saw_complete = false;
        while let Some(frame) = tick_rx.recv().await {
            if matches!(frame, ReplayFrame::Complete) {
                saw_complete = true;
            }
        }
        assert!(saw_complete);
    }
}
