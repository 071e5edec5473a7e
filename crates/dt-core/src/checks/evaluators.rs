//! Pure rule evaluators, one per check kind.
//!
//! An evaluator never touches storage: it takes the rule predicate, an
//! [`Observation`] probed from the target, and the current instant, and
//! produces a result with a structured detail payload. `Error` here means
//! the observation was unusable for the rule, not that the rule failed.

use crate::models::{CheckKind, CheckResult};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// A point-in-time measurement of a check target, supplied by a
/// [`DataProbe`](super::DataProbe). Fields are optional; each evaluator
/// requires only the ones its rule reads.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub row_count: Option<i64>,
    pub null_count: Option<i64>,
    pub last_arrival_at: Option<DateTime<Utc>>,
    pub metric_value: Option<f64>,
    pub source_row_count: Option<i64>,
    pub target_row_count: Option<i64>,
}

/// Result of one evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub result: CheckResult,
    pub details: Value,
}

impl EvaluationOutcome {
    fn new(result: CheckResult, details: Value) -> Self {
        Self { result, details }
    }

    fn error(reason: &str) -> Self {
        Self::new(CheckResult::Error, json!({"error": reason}))
    }
}

/// Dispatches to the evaluator for `kind`.
pub fn evaluate(
    kind: CheckKind,
    rule: &Value,
    observation: &Observation,
    now: DateTime<Utc>,
) -> EvaluationOutcome {
    match kind {
        CheckKind::Completeness => evaluate_completeness(rule, observation),
        CheckKind::Timeliness => evaluate_timeliness(rule, observation, now),
        CheckKind::Accuracy => evaluate_accuracy(rule, observation),
        CheckKind::Consistency => evaluate_consistency(rule, observation),
    }
}

/// Row-count floor and optional null-fraction ceiling. A zero row count is
/// flagged `no_recent_data` so the detector can classify the break as a
/// missing source rather than a value mismatch.
fn evaluate_completeness(rule: &Value, obs: &Observation) -> EvaluationOutcome {
    let Some(row_count) = obs.row_count else {
        return EvaluationOutcome::error("observation lacks row_count");
    };
    let min_rows = rule.get("min_row_count").and_then(Value::as_i64).unwrap_or(1);
    let warn_rows = rule.get("warn_row_count").and_then(Value::as_i64);
    let max_null_fraction = rule.get("max_null_fraction").and_then(Value::as_f64);

    let mut details = json!({
        "row_count": row_count,
        "min_row_count": min_rows,
    });
    if row_count == 0 {
        details["no_recent_data"] = json!(true);
        return EvaluationOutcome::new(CheckResult::Fail, details);
    }
    if row_count < min_rows {
        return EvaluationOutcome::new(CheckResult::Fail, details);
    }
    if let (Some(max_fraction), Some(nulls)) = (max_null_fraction, obs.null_count) {
        let fraction = nulls as f64 / row_count as f64;
        details["null_fraction"] = json!(fraction);
        if fraction > max_fraction {
            return EvaluationOutcome::new(CheckResult::Fail, details);
        }
    }
    if warn_rows.map(|w| row_count < w).unwrap_or(false) {
        return EvaluationOutcome::new(CheckResult::Warning, details);
    }
    EvaluationOutcome::new(CheckResult::Pass, details)
}

/// Arrival-delay ceiling, with an optional lower warning band.
fn evaluate_timeliness(rule: &Value, obs: &Observation, now: DateTime<Utc>) -> EvaluationOutcome {
    let Some(arrived) = obs.last_arrival_at else {
        return EvaluationOutcome::error("observation lacks last_arrival_at");
    };
    let Some(max_delay) = rule.get("max_delay_minutes").and_then(Value::as_i64) else {
        return EvaluationOutcome::error("rule lacks max_delay_minutes");
    };
    let delay = (now - arrived).num_minutes();
    let details = json!({
        "delay_minutes": delay,
        "max_delay_minutes": max_delay,
    });
    if delay > max_delay {
        return EvaluationOutcome::new(CheckResult::Fail, details);
    }
    let warn_delay = rule.get("warn_delay_minutes").and_then(Value::as_i64);
    if warn_delay.map(|w| delay > w).unwrap_or(false) {
        return EvaluationOutcome::new(CheckResult::Warning, details);
    }
    EvaluationOutcome::new(CheckResult::Pass, details)
}

/// Metric bounds, or expected-value-with-tolerance when given.
fn evaluate_accuracy(rule: &Value, obs: &Observation) -> EvaluationOutcome {
    let Some(value) = obs.metric_value else {
        return EvaluationOutcome::error("observation lacks metric_value");
    };
    let mut details = json!({"metric_value": value});
    if let Some(expected) = rule.get("expected_value").and_then(Value::as_f64) {
        let tolerance = rule.get("tolerance").and_then(Value::as_f64).unwrap_or(0.0);
        details["expected_value"] = json!(expected);
        details["tolerance"] = json!(tolerance);
        if (value - expected).abs() > tolerance {
            return EvaluationOutcome::new(CheckResult::Fail, details);
        }
        return EvaluationOutcome::new(CheckResult::Pass, details);
    }
    let min = rule.get("min_value").and_then(Value::as_f64);
    let max = rule.get("max_value").and_then(Value::as_f64);
    if min.map(|m| value < m).unwrap_or(false) || max.map(|m| value > m).unwrap_or(false) {
        return EvaluationOutcome::new(CheckResult::Fail, details);
    }
    EvaluationOutcome::new(CheckResult::Pass, details)
}

/// Source/target row-count drift ceiling across an edge.
fn evaluate_consistency(rule: &Value, obs: &Observation) -> EvaluationOutcome {
    let (Some(source), Some(target)) = (obs.source_row_count, obs.target_row_count) else {
        return EvaluationOutcome::error("observation lacks source/target row counts");
    };
    let max_drift = rule
        .get("max_drift_fraction")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let drift = (source - target).abs() as f64 / (source.max(1)) as f64;
    let details = json!({
        "source_row_count": source,
        "target_row_count": target,
        "drift_fraction": drift,
        "max_drift_fraction": max_drift,
    });
    if drift > max_drift {
        return EvaluationOutcome::new(CheckResult::Fail, details);
    }
    let warn_drift = rule.get("warn_drift_fraction").and_then(Value::as_f64);
    if warn_drift.map(|w| drift > w).unwrap_or(false) {
        return EvaluationOutcome::new(CheckResult::Warning, details);
    }
    EvaluationOutcome::new(CheckResult::Pass, details)
}
