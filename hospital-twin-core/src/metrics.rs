//! Pure aggregation functions: per-patient outcomes, sampled time series,
//! and the bottleneck log become the result bundle.

use crate::types::{
    BottleneckRecord, Constraint, MetricsSummary, PatientOutcome, RankedBottleneck, ResultBundle,
    TimeSeriesSample,
};
use std::collections::BTreeMap;

/// SLA breach threshold in minutes.
const SLA_THRESHOLD_MINUTES: f64 = 60.0;

/// Number of ranked bottlenecks surfaced in a result bundle.
const TOP_BOTTLENECKS: usize = 5;

pub fn aggregate(
    outcomes: &[PatientOutcome],
    samples: &[TimeSeriesSample],
    bottleneck_log: &[BottleneckRecord],
) -> ResultBundle {
    ResultBundle {
        metrics: summarize_metrics(outcomes, samples),
        timeseries: samples.to_vec(),
        bottlenecks: rank_bottlenecks(bottleneck_log, outcomes.len()),
    }
}

fn summarize_metrics(outcomes: &[PatientOutcome], samples: &[TimeSeriesSample]) -> MetricsSummary {
    let mut wait_times: Vec<f64> = outcomes.iter().filter_map(|o| o.wait_time_minutes).collect();
    let los_times: Vec<f64> = outcomes.iter().filter_map(|o| o.los_minutes).collect();
    wait_times.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let occupancies: Vec<f64> = samples.iter().map(|s| s.occupancy_pct).collect();
    let nurse_loads: Vec<f64> = samples.iter().map(|s| s.nurse_load).collect();

    MetricsSummary {
        total_patients: outcomes.len(),
        avg_wait_time_minutes: mean(&wait_times),
        median_wait_time_minutes: median(&wait_times),
        max_wait_time_minutes: wait_times.last().copied().unwrap_or(0.0),
        avg_los_minutes: mean(&los_times),
        sla_breaches: wait_times.iter().filter(|&&w| w > SLA_THRESHOLD_MINUTES).count(),
        avg_occupancy: mean(&occupancies),
        peak_occupancy: occupancies.iter().cloned().fold(0.0, f64::max),
        avg_nurse_load: mean(&nurse_loads),
    }
}

fn rank_bottlenecks(log: &[BottleneckRecord], total_patients: usize) -> Vec<RankedBottleneck> {
    let mut grouped: BTreeMap<Constraint, (usize, f64, usize)> = BTreeMap::new();
    for record in log {
        let entry = grouped.entry(record.constraint).or_insert((0, 0.0, 0));
        entry.0 += 1;
        if let Some(q) = record.queue_length {
            entry.1 += q as f64;
            entry.2 += 1;
        }
    }

    let denom = total_patients.max(1) as f64;
    let mut ranked: Vec<RankedBottleneck> = grouped
        .into_iter()
        .map(|(constraint, (occurrences, queue_total, queue_samples))| RankedBottleneck {
            constraint,
            occurrences,
            impact_score: occurrences as f64 / denom,
            avg_queue_length: if queue_samples > 0 {
                Some(queue_total / queue_samples as f64)
            } else {
                None
            },
            description: constraint.description(),
        })
        .collect();

    ranked.sort_by(|a, b| b.impact_score.partial_cmp(&a.impact_score).unwrap());
    ranked.truncate(TOP_BOTTLENECKS);
    ranked
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Assumes `values` is already sorted ascending.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Acuity;

    fn outcome(wait: Option<f64>, los: Option<f64>) -> PatientOutcome {
        PatientOutcome {
            patient_id: 1,
            acuity: Acuity::Low,
            wait_time_minutes: wait,
            los_minutes: los,
            imaging_delay_minutes: None,
        }
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn sla_breaches_count_strictly_over_threshold() {
        let outcomes = vec![
            outcome(Some(60.0), Some(100.0)),
            outcome(Some(60.1), Some(100.0)),
            outcome(Some(120.0), Some(100.0)),
        ];
        let summary = summarize_metrics(&outcomes, &[]);
        assert_eq!(summary.sla_breaches, 2);
    }

    #[test]
    fn bottleneck_ranking_sorted_descending_and_capped() {
        let mut log = Vec::new();
        for _ in 0..3 {
            log.push(BottleneckRecord {
                time: 0.0,
                constraint: Constraint::NurseStaffing,
                patient_id: None,
                queue_length: None,
                description: None,
            });
        }
        for _ in 0..10 {
            log.push(BottleneckRecord {
                time: 0.0,
                constraint: Constraint::BedAvailability,
                patient_id: None,
                queue_length: Some(2),
                description: None,
            });
        }
        let ranked = rank_bottlenecks(&log, 20);
        assert_eq!(ranked[0].constraint, Constraint::BedAvailability);
        assert_eq!(ranked[0].occurrences, 10);
        assert_eq!(ranked[0].avg_queue_length, Some(2.0));
        assert_eq!(ranked[1].constraint, Constraint::NurseStaffing);
        assert_eq!(ranked[1].avg_queue_length, None);
    }

    #[test]
    fn empty_outcomes_produce_zeroed_summary_not_nan() {
        let summary = summarize_metrics(&[], &[]);
        assert_eq!(summary.avg_wait_time_minutes, 0.0);
        assert_eq!(summary.median_wait_time_minutes, 0.0);
    }
}
