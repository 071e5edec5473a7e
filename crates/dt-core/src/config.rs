//! Engine configuration.
//!
//! The spec leaves the risk weighting formula, break penalties, and the
//! orphan grace period as tunable parameters rather than constants; they all
//! live here with conservative defaults.

use crate::models::breaks::Severity;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Weights for combining component scores into an overall risk score.
///
/// Weights should sum to 1.0; they are renormalized over the components
/// actually present in the lookback window at computation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    /// Weight for the completeness pass rate.
    pub completeness: f64,
    /// Weight for the timeliness pass rate.
    pub timeliness: f64,
    /// Weight for the accuracy pass rate.
    pub accuracy: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            completeness: 1.0 / 3.0,
            timeliness: 1.0 / 3.0,
            accuracy: 1.0 / 3.0,
        }
    }
}

impl RiskWeights {
    /// Returns the sum of all weights.
    pub fn total(&self) -> f64 {
        self.completeness + self.timeliness + self.accuracy
    }

    /// Validates that weights are non-negative and sum to approximately 1.0.
    pub fn validate(&self) -> Result<(), String> {
        if self.completeness < 0.0 || self.timeliness < 0.0 || self.accuracy < 0.0 {
            return Err("All weights must be non-negative".to_string());
        }
        let total = self.total();
        if (total - 1.0).abs() > 0.01 {
            return Err(format!("Weights must sum to approximately 1.0, got {total}"));
        }
        Ok(())
    }
}

/// Score points subtracted from the overall score per open break event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakPenalties {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for BreakPenalties {
    fn default() -> Self {
        Self {
            low: 2.0,
            medium: 5.0,
            high: 12.0,
            critical: 25.0,
        }
    }
}

impl BreakPenalties {
    /// Returns the penalty for an open break of the given severity.
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// Bounded retry policy for evaluator-level failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `attempt` (1-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.initial_backoff_ms as f64 * factor) as u64)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Weights for the overall risk score.
    pub weights: RiskWeights,
    /// Per-severity penalties for open break events.
    pub penalties: BreakPenalties,
    /// Minutes an origin-unknown asset may remain unclassified before the
    /// orphan sweep emits an `orphaned_asset` break event.
    pub orphan_grace_minutes: i64,
    /// Lookback window for check pass rates, in minutes.
    pub lookback_minutes: i64,
    /// Time-to-live of a scheduled-run claim before it becomes reclaimable.
    pub claim_ttl_secs: u64,
    /// Bounded timeout for evaluator calls to external data.
    pub probe_timeout_secs: u64,
    /// Retry policy for evaluator errors.
    pub check_retry: RetryPolicy,
    /// Impact amount (minor units) at or above which break severity is
    /// escalated one level.
    pub impact_escalation_minor: i64,
    /// Hours a risk snapshot remains valid before it is considered stale.
    pub score_valid_hours: i64,
    /// Hard cap on lineage traversal depth.
    pub max_traversal_depth: u32,
    /// ISO 4217 code assumed for impact amounts that carry no explicit
    /// currency; exposure sums cover only this currency.
    pub default_currency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            penalties: BreakPenalties::default(),
            orphan_grace_minutes: 24 * 60,
            lookback_minutes: 7 * 24 * 60,
            claim_ttl_secs: 300,
            probe_timeout_secs: 30,
            check_retry: RetryPolicy::default(),
            impact_escalation_minor: 1_000_000,
            score_valid_hours: 24,
            max_traversal_depth: 100,
            default_currency: "INR".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_valid() {
        assert!(RiskWeights::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let w = RiskWeights {
            completeness: 0.9,
            timeliness: 0.9,
            accuracy: 0.9,
        };
        assert!(w.validate().is_err());
        let w = RiskWeights {
            completeness: -0.5,
            timeliness: 1.0,
            accuracy: 0.5,
        };
        assert!(w.validate().is_err());
    }

    #[test]
    fn test_backoff_grows() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_penalty_lookup() {
        let p = BreakPenalties::default();
        assert!(p.for_severity(Severity::Critical) > p.for_severity(Severity::Low));
    }
}
