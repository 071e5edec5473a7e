//! Risk score snapshot model.
//!
//! A `RiskScore` is a point-in-time snapshot for one asset. Snapshots are
//! immutable once written: recomputation always appends, so score history
//! forms a time series per asset and the latest `computed_at` is
//! authoritative for "current score" queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point-in-time risk snapshot for one asset. All scores are in [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskScore {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Scored asset.
    pub asset_id: Uuid,
    /// Weighted overall score after break penalties.
    pub overall_score: u8,
    /// Completeness pass rate component, if any checks of that kind ran.
    pub completeness_score: Option<u8>,
    /// Timeliness pass rate component.
    pub timeliness_score: Option<u8>,
    /// Accuracy pass rate component (consistency runs fold in here).
    pub accuracy_score: Option<u8>,
    /// Factor breakdown for operator display.
    pub factors: serde_json::Value,
    /// Overall score of the most recent prior snapshot.
    pub previous_score: Option<u8>,
    /// Signed delta vs the prior snapshot; 0 when there is none.
    pub score_change: i16,
    /// Estimated financial exposure in minor currency units.
    pub exposure_minor: Option<i64>,
    /// ISO 4217 currency code for `exposure_minor`.
    pub currency: String,
    pub computed_at: DateTime<Utc>,
    /// After this instant the snapshot is stale and eligible for
    /// recomputation. Retention of old snapshots is an external concern.
    pub valid_until: Option<DateTime<Utc>>,
}

impl RiskScore {
    /// Returns `true` once the snapshot should be treated as stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map(|t| now >= t).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(valid_until: Option<DateTime<Utc>>) -> RiskScore {
        RiskScore {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            overall_score: 87,
            completeness_score: Some(90),
            timeliness_score: None,
            accuracy_score: Some(84),
            factors: serde_json::json!({}),
            previous_score: None,
            score_change: 0,
            exposure_minor: None,
            currency: "INR".into(),
            computed_at: Utc::now(),
            valid_until,
        }
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        assert!(!snapshot(None).is_stale(now));
        assert!(!snapshot(Some(now + Duration::hours(1))).is_stale(now));
        assert!(snapshot(Some(now - Duration::hours(1))).is_stale(now));
    }
}
