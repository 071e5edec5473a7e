//! Audit period model.
//!
//! An audit period is a bounded time window. Once closed, data whose
//! creation falls inside the window is rejected for ordinary modification;
//! override requires an elevated role and is always audited. Entities
//! outside any recorded period are treated as open; periods are opt-in
//! bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a period still accepts modifications.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    #[default]
    Open,
    Closed,
}

impl PeriodStatus {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// A bounded audit time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPeriod {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Display name, e.g. "FY25-Q3".
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: PeriodStatus,
    pub closed_by: Option<Uuid>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl AuditPeriod {
    /// Creates a new open period over `[starts_at, ends_at)`.
    pub fn new(
        tenant_id: Uuid,
        name: impl Into<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            starts_at,
            ends_at,
            status: PeriodStatus::Open,
            closed_by: None,
            closed_at: None,
        }
    }

    /// Returns `true` if `at` falls inside the window.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at && at < self.ends_at
    }

    /// Marks the period closed, attributed to `actor`.
    pub fn close(&mut self, actor: Uuid) {
        self.status = PeriodStatus::Closed;
        self.closed_by = Some(actor);
        self.closed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_covers_half_open() {
        let start = Utc::now();
        let end = start + Duration::days(30);
        let p = AuditPeriod::new(Uuid::new_v4(), "FY25-Q3", start, end);
        assert!(p.covers(start));
        assert!(p.covers(end - Duration::seconds(1)));
        assert!(!p.covers(end));
        assert!(!p.covers(start - Duration::seconds(1)));
    }

    #[test]
    fn test_close_attributes_actor() {
        let mut p = AuditPeriod::new(
            Uuid::new_v4(),
            "FY25-Q4",
            Utc::now(),
            Utc::now() + Duration::days(90),
        );
        let actor = Uuid::new_v4();
        p.close(actor);
        assert_eq!(p.status, PeriodStatus::Closed);
        assert_eq!(p.closed_by, Some(actor));
    }
}
