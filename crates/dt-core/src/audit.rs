//! Audit trail.
//!
//! Every state-changing engine operation appends an entry here, and closed-
//! period overrides are recorded unconditionally; an override is never
//! silent. The trail is a bounded ring; long-term retention is an external
//! concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Default maximum number of retained entries.
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Types of auditable engine events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SourceRegistered,
    SourceDeactivated,
    AssetRegistered,
    AssetDeactivated,
    OriginClassified,
    EdgeCreated,
    EdgeDeactivated,
    EdgeValidated,
    /// An admin modified data belonging to a closed audit period.
    PeriodOverride,
    CheckCreated,
    CheckCompleted,
    BreakDetected,
    BreakStatusChanged,
    ScoreComputed,
}

/// An entry in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub tenant_id: Uuid,
    /// Actor attributed with the change.
    pub actor_id: Uuid,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub description: String,
    pub details: serde_json::Value,
}

impl AuditEntry {
    /// Creates an entry timestamped now.
    pub fn new(
        event_type: AuditEventType,
        tenant_id: Uuid,
        actor_id: Uuid,
        resource_type: impl Into<String>,
        resource_id: Uuid,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            tenant_id,
            actor_id,
            resource_type: resource_type.into(),
            resource_id,
            description: description.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attaches a structured detail payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Bounded in-memory audit trail.
pub struct AuditTrail {
    entries: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditTrail {
    /// Creates a trail retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub async fn record(&self, entry: AuditEntry) {
        info!(
            event = ?entry.event_type,
            tenant = %entry.tenant_id,
            actor = %entry.actor_id,
            resource = %entry.resource_id,
            "{}",
            entry.description
        );
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The most recent `limit` entries for a tenant, newest first.
    pub async fn recent(&self, tenant_id: Uuid, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// All entries touching one resource, newest first.
    pub async fn for_resource(&self, tenant_id: Uuid, resource_id: Uuid) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id && e.resource_id == resource_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_and_recent() {
        let trail = AuditTrail::new(100);
        let tenant = Uuid::new_v4();
        let actor = Uuid::new_v4();
        for i in 0..3 {
            trail
                .record(AuditEntry::new(
                    AuditEventType::AssetRegistered,
                    tenant,
                    actor,
                    "data_asset",
                    Uuid::new_v4(),
                    format!("asset {i}"),
                ))
                .await;
        }
        let recent = trail.recent(tenant, 2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "asset 2");
        // Other tenants see nothing.
        assert!(trail.recent(Uuid::new_v4(), 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_eviction() {
        let trail = AuditTrail::new(2);
        let tenant = Uuid::new_v4();
        let actor = Uuid::new_v4();
        for i in 0..3 {
            trail
                .record(AuditEntry::new(
                    AuditEventType::EdgeCreated,
                    tenant,
                    actor,
                    "lineage_edge",
                    Uuid::new_v4(),
                    format!("edge {i}"),
                ))
                .await;
        }
        let recent = trail.recent(tenant, 10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].description, "edge 1");
    }

    #[tokio::test]
    async fn test_for_resource() {
        let trail = AuditTrail::default();
        let tenant = Uuid::new_v4();
        let resource = Uuid::new_v4();
        trail
            .record(
                AuditEntry::new(
                    AuditEventType::PeriodOverride,
                    tenant,
                    Uuid::new_v4(),
                    "lineage_edge",
                    resource,
                    "closed-period override",
                )
                .with_details(serde_json::json!({"reason": "restatement"})),
            )
            .await;
        let entries = trail.for_resource(tenant, resource).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details["reason"], "restatement");
    }
}
