//! Integrity check model and scheduling state.
//!
//! A check binds a validation rule of one of four kinds to an asset or an
//! edge. Scheduled checks carry a `next_run_at` slot and an optional
//! `RunClaim`: the persisted in-flight marker that gives one worker
//! exclusive rights to execute a specific scheduled slot. There is no
//! singleton in-process scheduler; any worker can observe and reclaim
//! abandoned slots once the claim expires.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of validation rule; selects the evaluator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Completeness,
    Timeliness,
    Accuracy,
    Consistency,
}

impl CheckKind {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CheckKind::Completeness => "completeness",
            CheckKind::Timeliness => "timeliness",
            CheckKind::Accuracy => "accuracy",
            CheckKind::Consistency => "consistency",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Outcome of a single check run.
///
/// `Error` denotes evaluator failure (target data unreachable, malformed
/// rule) and is distinct from `Fail`, where the rule executed and the
/// condition was violated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    Pass,
    Warning,
    Fail,
    Error,
}

impl CheckResult {
    /// Returns `true` for results handed to the break event detector.
    pub fn is_failure(&self) -> bool {
        matches!(self, CheckResult::Fail | CheckResult::Error)
    }

    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CheckResult::Pass => "pass",
            CheckResult::Warning => "warning",
            CheckResult::Fail => "fail",
            CheckResult::Error => "error",
        }
    }
}

impl std::fmt::Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Persisted in-flight marker for one scheduled slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunClaim {
    /// Token identifying the claiming worker.
    pub owner_token: Uuid,
    /// The scheduled slot being executed.
    pub slot: DateTime<Utc>,
    /// When the claim lapses and the slot becomes reclaimable.
    pub expires_at: DateTime<Utc>,
}

impl RunClaim {
    /// Creates a claim for `slot`, expiring after `ttl_secs`.
    pub fn new(slot: DateTime<Utc>, ttl_secs: u64) -> Self {
        Self {
            owner_token: Uuid::new_v4(),
            slot,
            expires_at: Utc::now() + Duration::seconds(ttl_secs as i64),
        }
    }

    /// Returns `true` once the claiming worker is presumed dead.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// A validation rule bound to an asset or an edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityCheck {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Target asset; at least one of asset/edge is required.
    pub asset_id: Option<Uuid>,
    /// Target edge.
    pub edge_id: Option<Uuid>,
    /// Name, unique per tenant.
    pub name: String,
    /// Kind; selects the evaluator.
    pub kind: CheckKind,
    /// Structured rule predicate, opaque to the engine beyond dispatch.
    pub rule: serde_json::Value,
    /// Run interval; `None` means manual-only.
    pub frequency_minutes: Option<i64>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Next scheduled slot; advanced from the scheduled time, not the
    /// actual run time, so a delayed run does not drift the schedule.
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_result: Option<CheckResult>,
    pub last_result_details: Option<serde_json::Value>,
    /// In-flight claim for the current slot, if a worker holds one.
    pub claim: Option<RunClaim>,
    /// Soft-deletion flag.
    pub active: bool,
    /// Actor who created the check.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntegrityCheck {
    /// Returns `true` when a scheduled run is owed as of `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.frequency_minutes.is_some()
            && self.next_run_at.map(|t| t <= now).unwrap_or(false)
    }

    /// Advances `next_run_at` from the scheduled slot, never from `now`.
    pub fn advance_schedule(&mut self, slot: DateTime<Utc>) {
        if let Some(freq) = self.frequency_minutes {
            self.next_run_at = Some(slot + Duration::minutes(freq));
        }
    }
}

/// One executed check run, appended to the run history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRun {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub check_id: Uuid,
    /// Target asset of the check, denormalized for risk lookbacks.
    pub asset_id: Option<Uuid>,
    pub kind: CheckKind,
    /// Scheduled slot, or `None` for a manual invocation.
    pub slot: Option<DateTime<Utc>>,
    pub result: CheckResult,
    pub details: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(freq: Option<i64>) -> IntegrityCheck {
        let now = Utc::now();
        IntegrityCheck {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            asset_id: Some(Uuid::new_v4()),
            edge_id: None,
            name: "orders-complete".into(),
            kind: CheckKind::Completeness,
            rule: serde_json::json!({"min_row_count": 1}),
            frequency_minutes: freq,
            last_run_at: None,
            next_run_at: freq.map(|m| now - Duration::minutes(m)),
            last_result: None,
            last_result_details: None,
            claim: None,
            active: true,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_manual_check_never_due() {
        assert!(!check(None).is_due(Utc::now()));
    }

    #[test]
    fn test_scheduled_check_due_when_slot_passed() {
        assert!(check(Some(15)).is_due(Utc::now()));
    }

    #[test]
    fn test_advance_schedule_from_slot() {
        let mut c = check(Some(60));
        let slot = c.next_run_at.unwrap();
        c.advance_schedule(slot);
        assert_eq!(c.next_run_at, Some(slot + Duration::minutes(60)));
    }

    #[test]
    fn test_claim_expiry() {
        let live = RunClaim::new(Utc::now(), 300);
        assert!(!live.is_expired());
        let mut dead = RunClaim::new(Utc::now(), 300);
        dead.expires_at = Utc::now() - Duration::seconds(1);
        assert!(dead.is_expired());
    }

    #[test]
    fn test_result_failure_classification() {
        assert!(CheckResult::Fail.is_failure());
        assert!(CheckResult::Error.is_failure());
        assert!(!CheckResult::Pass.is_failure());
        assert!(!CheckResult::Warning.is_failure());
    }
}
