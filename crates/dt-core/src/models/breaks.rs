//! Break event model and status state machine.
//!
//! A `BreakEvent` is the materialized record of a detected integrity
//! anomaly. Status transitions are validated against a central table;
//! `Resolved` and `Dismissed` are terminal, and a recurrence always creates
//! a new event rather than reopening a terminal one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag of a detected anomaly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// Completeness failure with no recent inbound data.
    MissingSource,
    /// Accuracy or consistency mismatch.
    DataMismatch,
    /// Timing-window violation; the data is stored but tagged late.
    LateArrival,
    /// Origin-unknown asset past the classification grace period.
    OrphanedAsset,
    /// A rejected edge would have closed a directed cycle.
    CycleDetected,
}

impl BreakKind {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BreakKind::MissingSource => "missing_source",
            BreakKind::DataMismatch => "data_mismatch",
            BreakKind::LateArrival => "late_arrival",
            BreakKind::OrphanedAsset => "orphaned_asset",
            BreakKind::CycleDetected => "cycle_detected",
        }
    }
}

impl std::fmt::Display for BreakKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Severity of a break event, ordered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Escalates one level, saturating at `Critical`.
    pub fn escalate(&self) -> Severity {
        match self {
            Severity::Low => Severity::Medium,
            Severity::Medium => Severity::High,
            Severity::High => Severity::Critical,
            Severity::Critical => Severity::Critical,
        }
    }

    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Lifecycle status of a break event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BreakStatus {
    Open,
    Investigating,
    Resolved,
    Dismissed,
}

/// The full transition table; anything not listed is rejected.
const TRANSITIONS: &[(BreakStatus, BreakStatus)] = &[
    (BreakStatus::Open, BreakStatus::Investigating),
    (BreakStatus::Open, BreakStatus::Resolved),
    (BreakStatus::Open, BreakStatus::Dismissed),
    (BreakStatus::Investigating, BreakStatus::Resolved),
    (BreakStatus::Investigating, BreakStatus::Dismissed),
];

impl BreakStatus {
    /// Returns `true` for states that permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BreakStatus::Resolved | BreakStatus::Dismissed)
    }

    /// Returns `true` if the transition `self -> to` is in the table.
    pub fn can_transition_to(&self, to: BreakStatus) -> bool {
        TRANSITIONS.contains(&(*self, to))
    }

    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BreakStatus::Open => "open",
            BreakStatus::Investigating => "investigating",
            BreakStatus::Resolved => "resolved",
            BreakStatus::Dismissed => "dismissed",
        }
    }
}

impl std::fmt::Display for BreakStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// A materialized record of a detected integrity anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakEvent {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Originating check, if any.
    pub check_id: Option<Uuid>,
    /// Affected asset, if any.
    pub asset_id: Option<Uuid>,
    /// Affected edge, if any.
    pub edge_id: Option<Uuid>,
    pub kind: BreakKind,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    /// Structured detail payload from the detector.
    pub details: Option<serde_json::Value>,
    /// Estimated financial impact in minor currency units.
    pub impact_minor: Option<i64>,
    /// ISO 4217 currency code for `impact_minor`.
    pub currency: String,
    pub status: BreakStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolution_notes: Option<String>,
    pub detected_at: DateTime<Utc>,
    /// Actor (or system principal) attributed with the detection.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl BreakEvent {
    /// Creates a new open break event detected now.
    pub fn new(
        tenant_id: Uuid,
        kind: BreakKind,
        severity: Severity,
        title: impl Into<String>,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            check_id: None,
            asset_id: None,
            edge_id: None,
            kind,
            severity,
            title: title.into(),
            description: None,
            details: None,
            impact_minor: None,
            currency: "INR".to_string(),
            status: BreakStatus::Open,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
            detected_at: now,
            created_by,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(BreakStatus::Resolved.is_terminal());
        assert!(BreakStatus::Dismissed.is_terminal());
        assert!(!BreakStatus::Open.is_terminal());
        assert!(!BreakStatus::Investigating.is_terminal());
    }

    #[test]
    fn test_transition_table() {
        assert!(BreakStatus::Open.can_transition_to(BreakStatus::Investigating));
        assert!(BreakStatus::Investigating.can_transition_to(BreakStatus::Resolved));
        assert!(BreakStatus::Investigating.can_transition_to(BreakStatus::Dismissed));
        // Terminal states never transition again.
        assert!(!BreakStatus::Resolved.can_transition_to(BreakStatus::Open));
        assert!(!BreakStatus::Dismissed.can_transition_to(BreakStatus::Investigating));
        // No backwards moves.
        assert!(!BreakStatus::Investigating.can_transition_to(BreakStatus::Open));
    }

    #[test]
    fn test_severity_escalation_saturates() {
        assert_eq!(Severity::Low.escalate(), Severity::Medium);
        assert_eq!(Severity::High.escalate(), Severity::Critical);
        assert_eq!(Severity::Critical.escalate(), Severity::Critical);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_new_event_is_open() {
        let ev = BreakEvent::new(
            Uuid::new_v4(),
            BreakKind::MissingSource,
            Severity::High,
            "no data",
            Uuid::new_v4(),
        );
        assert_eq!(ev.status, BreakStatus::Open);
        assert!(ev.resolved_at.is_none());
    }
}
