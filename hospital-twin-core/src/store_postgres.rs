//! PostgreSQL-backed `SimulationStore`, gated behind the `postgres` feature.
//! Mirrors the teacher's `PostgresProcessStore`: one `sqlx::PgPool`, plain
//! parameterized queries, `ON CONFLICT` upserts for the mutable tables.

use crate::error::{SimError, SimResult};
use crate::store::{EventFilter, SimulationStore};
use crate::types::{EventType, PersistedEvent, Run, RunStatus, Scenario};
use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

/// Convert an epoch-ms i64 to a `chrono::DateTime<chrono::Utc>` for TIMESTAMPTZ binding.
fn epoch_ms_to_datetime(epoch_ms: i64) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    let secs = epoch_ms / 1000;
    let nanos = ((epoch_ms % 1000) * 1_000_000) as u32;
    chrono::Utc
        .timestamp_opt(secs, nanos)
        .single()
        .unwrap_or_else(chrono::Utc::now)
}

fn run_status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
    }
}

fn run_status_from_str(s: &str) -> anyhow::Result<RunStatus> {
    Ok(match s {
        "pending" => RunStatus::Pending,
        "running" => RunStatus::Running,
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        other => anyhow::bail!("unknown run status: {other}"),
    })
}

fn event_type_str(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Arrival => "arrival",
        EventType::Triage => "triage",
        EventType::AdmissionRequest => "admission_request",
        EventType::BedAssignment => "bed_assignment",
        EventType::Transfer => "transfer",
        EventType::ImagingRequest => "imaging_request",
        EventType::ImagingStart => "imaging_start",
        EventType::ImagingEnd => "imaging_end",
        EventType::ConsultRequest => "consult_request",
        EventType::ConsultStart => "consult_start",
        EventType::ConsultEnd => "consult_end",
        EventType::CleaningStart => "cleaning_start",
        EventType::CleaningEnd => "cleaning_end",
        EventType::Discharge => "discharge",
        EventType::Escalation => "escalation",
        EventType::NurseAssignment => "nurse_assignment",
        EventType::TransportRequest => "transport_request",
        EventType::TransportStart => "transport_start",
        EventType::TransportEnd => "transport_end",
    }
}

fn event_type_from_str(s: &str) -> anyhow::Result<EventType> {
    Ok(match s {
        "arrival" => EventType::Arrival,
        "triage" => EventType::Triage,
        "admission_request" => EventType::AdmissionRequest,
        "bed_assignment" => EventType::BedAssignment,
        "transfer" => EventType::Transfer,
        "imaging_request" => EventType::ImagingRequest,
        "imaging_start" => EventType::ImagingStart,
        "imaging_end" => EventType::ImagingEnd,
        "consult_request" => EventType::ConsultRequest,
        "consult_start" => EventType::ConsultStart,
        "consult_end" => EventType::ConsultEnd,
        "cleaning_start" => EventType::CleaningStart,
        "cleaning_end" => EventType::CleaningEnd,
        "discharge" => EventType::Discharge,
        "escalation" => EventType::Escalation,
        "nurse_assignment" => EventType::NurseAssignment,
        "transport_request" => EventType::TransportRequest,
        "transport_start" => EventType::TransportStart,
        "transport_end" => EventType::TransportEnd,
        other => anyhow::bail!("unknown event type: {other}"),
    })
}

/// PostgreSQL-backed implementation of `SimulationStore`.
pub struct PostgresSimulationStore {
    pool: sqlx::PgPool,
}

impl PostgresSimulationStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Run embedded migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run hospital-twin migrations")?;
        Ok(())
    }
}

#[async_trait]
impl SimulationStore for PostgresSimulationStore {
    async fn save_scenario(&self, scenario: &Scenario) -> SimResult<()> {
        let parameters = serde_json::to_value(&scenario.parameters).map_err(anyhow::Error::from)?;
        let created_at = epoch_ms_to_datetime(scenario.created_at);

        sqlx::query(
            r#"
            INSERT INTO scenarios (id, name, parameters, is_baseline, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                parameters = EXCLUDED.parameters,
                is_baseline = EXCLUDED.is_baseline
            "#,
        )
        .bind(scenario.id)
        .bind(&scenario.name)
        .bind(&parameters)
        .bind(scenario.is_baseline)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        Ok(())
    }

    async fn load_scenario(&self, id: Uuid) -> SimResult<Option<Scenario>> {
        use sqlx::Row;
        let row = sqlx::query(
            r#"
            SELECT id, name, parameters, is_baseline,
                   EXTRACT(EPOCH FROM created_at) * 1000 AS created_at_ms
            FROM scenarios
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let parameters_json: serde_json::Value = row.get("parameters");
                let created_at_ms: f64 = row.get("created_at_ms");
                Ok(Some(Scenario {
                    id: row.get("id"),
                    name: row.get("name"),
                    parameters: serde_json::from_value(parameters_json)
                        .context("failed to deserialize scenario parameters")?,
                    is_baseline: row.get("is_baseline"),
                    created_at: created_at_ms as i64,
                }))
            }
        }
    }

    async fn list_scenarios(&self) -> SimResult<Vec<Scenario>> {
        use sqlx::Row;
        let rows = sqlx::query(
            r#"
            SELECT id, name, parameters, is_baseline,
                   EXTRACT(EPOCH FROM created_at) * 1000 AS created_at_ms
            FROM scenarios
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        let mut scenarios = Vec::with_capacity(rows.len());
        for row in rows {
            let parameters_json: serde_json::Value = row.get("parameters");
            let created_at_ms: f64 = row.get("created_at_ms");
            scenarios.push(Scenario {
                id: row.get("id"),
                name: row.get("name"),
                parameters: serde_json::from_value(parameters_json)
                    .context("failed to deserialize scenario parameters")?,
                is_baseline: row.get("is_baseline"),
                created_at: created_at_ms as i64,
            });
        }
        Ok(scenarios)
    }

    async fn delete_scenario(&self, id: Uuid) -> SimResult<()> {
        use sqlx::Row;
        let row = sqlx::query("SELECT is_baseline FROM scenarios WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        match row {
            None => Err(SimError::NotFound(format!("scenario {id}"))),
            Some(row) if row.get::<bool, _>("is_baseline") => Err(SimError::StateViolation(
                "baseline scenario cannot be deleted".to_string(),
            )),
            Some(_) => {
                sqlx::query("DELETE FROM scenarios WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(anyhow::Error::from)?;
                Ok(())
            }
        }
    }

    async fn save_run(&self, run: &Run) -> SimResult<()> {
        let metrics = run
            .metrics
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(anyhow::Error::from)?;
        let timeseries = run
            .timeseries
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(anyhow::Error::from)?;
        let bottlenecks = run
            .bottlenecks
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(anyhow::Error::from)?;
        let started_at = run.started_at.map(epoch_ms_to_datetime);
        let completed_at = run.completed_at.map(epoch_ms_to_datetime);

        sqlx::query(
            r#"
            INSERT INTO simulation_runs (
                id, scenario_id, status, progress, started_at, completed_at,
                metrics, timeseries, bottlenecks, error_message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                progress = EXCLUDED.progress,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at,
                metrics = EXCLUDED.metrics,
                timeseries = EXCLUDED.timeseries,
                bottlenecks = EXCLUDED.bottlenecks,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(run.id)
        .bind(run.scenario_id)
        .bind(run_status_str(run.status))
        .bind(run.progress as i16)
        .bind(started_at)
        .bind(completed_at)
        .bind(&metrics)
        .bind(&timeseries)
        .bind(&bottlenecks)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        Ok(())
    }

    async fn load_run(&self, id: Uuid) -> SimResult<Option<Run>> {
        use sqlx::Row;
        let row = sqlx::query(
            r#"
            SELECT id, scenario_id, status, progress,
                   EXTRACT(EPOCH FROM started_at) * 1000 AS started_at_ms,
                   EXTRACT(EPOCH FROM completed_at) * 1000 AS completed_at_ms,
                   metrics, timeseries, bottlenecks, error_message
            FROM simulation_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        match row {
            None => Ok(None),
            Some(row) => Ok(Some(row_to_run(row)?)),
        }
    }

    async fn list_runs_for_scenario(&self, scenario_id: Uuid) -> SimResult<Vec<Run>> {
        let rows = sqlx::query(
            r#"
            SELECT id, scenario_id, status, progress,
                   EXTRACT(EPOCH FROM started_at) * 1000 AS started_at_ms,
                   EXTRACT(EPOCH FROM completed_at) * 1000 AS completed_at_ms,
                   metrics, timeseries, bottlenecks, error_message
            FROM simulation_runs
            WHERE scenario_id = $1
            ORDER BY started_at
            "#,
        )
        .bind(scenario_id)
        .fetch_all(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            runs.push(row_to_run(row)?);
        }
        Ok(runs)
    }

    async fn update_run_progress(&self, id: Uuid, progress: u8) -> SimResult<()> {
        let result = sqlx::query("UPDATE simulation_runs SET progress = $1 WHERE id = $2")
            .bind(progress as i16)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            return Err(SimError::NotFound(format!("run {id}")));
        }
        Ok(())
    }

    async fn append_events(&self, events: &[PersistedEvent]) -> SimResult<()> {
        let mut tx = self.pool.begin().await.map_err(anyhow::Error::from)?;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO simulation_events (
                    id, timestamp, event_type, patient_id, unit_id, bed_id,
                    nurse_id, data, scenario_id
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(event.id)
            .bind(epoch_ms_to_datetime(event.timestamp))
            .bind(event_type_str(event.event_type))
            .bind(event.patient_id.map(|p| p as i64))
            .bind(event.unit_id)
            .bind(event.bed_id.map(|b| b as i64))
            .bind(event.nurse_id.map(|n| n as i64))
            .bind(&event.data)
            .bind(event.scenario_id)
            .execute(&mut *tx)
            .await
            .map_err(anyhow::Error::from)?;
        }
        tx.commit().await.map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn read_events(&self, filter: &EventFilter) -> SimResult<Vec<PersistedEvent>> {
        use sqlx::Row;

        let mut builder = sqlx::QueryBuilder::new(
            "SELECT id, EXTRACT(EPOCH FROM timestamp) * 1000 AS timestamp_ms, event_type, \
             patient_id, unit_id, bed_id, nurse_id, data, scenario_id FROM simulation_events \
             WHERE 1 = 1",
        );
        if let Some(unit_id) = filter.unit_id {
            builder.push(" AND unit_id = ").push_bind(unit_id);
        }
        if let Some(patient_id) = filter.patient_id {
            builder.push(" AND patient_id = ").push_bind(patient_id as i64);
        }
        if let Some(event_type) = filter.event_type {
            builder
                .push(" AND event_type = ")
                .push_bind(event_type_str(event_type));
        }
        if let Some(start_time) = filter.start_time {
            builder
                .push(" AND timestamp >= ")
                .push_bind(epoch_ms_to_datetime(start_time));
        }
        if let Some(end_time) = filter.end_time {
            builder
                .push(" AND timestamp <= ")
                .push_bind(epoch_ms_to_datetime(end_time));
        }
        if let Some(scenario_id) = filter.scenario_id {
            builder.push(" AND scenario_id = ").push_bind(scenario_id);
        }
        builder.push(" ORDER BY timestamp");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_type_raw: String = row.get("event_type");
            let timestamp_ms: f64 = row.get("timestamp_ms");
            events.push(PersistedEvent {
                id: row.get("id"),
                timestamp: timestamp_ms as i64,
                event_type: event_type_from_str(&event_type_raw).map_err(anyhow::Error::from)?,
                patient_id: row.get::<Option<i64>, _>("patient_id").map(|p| p as u32),
                unit_id: row.get("unit_id"),
                bed_id: row.get::<Option<i64>, _>("bed_id").map(|b| b as u32),
                nurse_id: row.get::<Option<i64>, _>("nurse_id").map(|n| n as u32),
                data: row.get("data"),
                scenario_id: row.get("scenario_id"),
            });
        }
        Ok(events)
    }
}

fn row_to_run(row: sqlx::postgres::PgRow) -> anyhow::Result<Run> {
    use sqlx::Row;
    let status_raw: String = row.get("status");
    let started_at_ms: Option<f64> = row.get("started_at_ms");
    let completed_at_ms: Option<f64> = row.get("completed_at_ms");
    let metrics_json: Option<serde_json::Value> = row.get("metrics");
    let timeseries_json: Option<serde_json::Value> = row.get("timeseries");
    let bottlenecks_json: Option<serde_json::Value> = row.get("bottlenecks");

    Ok(Run {
        id: row.get("id"),
        scenario_id: row.get("scenario_id"),
        status: run_status_from_str(&status_raw)?,
        progress: row.get::<i16, _>("progress") as u8,
        started_at: started_at_ms.map(|ms| ms as i64),
        completed_at: completed_at_ms.map(|ms| ms as i64),
        metrics: metrics_json.map(serde_json::from_value).transpose()?,
        timeseries: timeseries_json.map(serde_json::from_value).transpose()?,
        bottlenecks: bottlenecks_json.map(serde_json::from_value).transpose()?,
        error_message: row.get("error_message"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_round_trips_through_strings() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            assert_eq!(run_status_from_str(run_status_str(status)).unwrap(), status);
        }
    }

    #[test]
    fn event_type_round_trips_through_strings() {
        for event_type in [
            EventType::Arrival,
            EventType::ConsultEnd,
            EventType::TransportEnd,
        ] {
            assert_eq!(
                event_type_from_str(event_type_str(event_type)).unwrap(),
                event_type
            );
        }
    }

    #[test]
    fn unknown_run_status_string_is_rejected() {
        assert!(run_status_from_str("bogus").is_err());
    }
}
