//! Storage layer: per-collection repository traits.
//!
//! Each of the six record collections is tenant-partitioned; uniqueness and
//! foreign-key constraints are enforced here regardless of backend. The
//! in-memory implementation in [`memory`] is always available; a SQLite
//! implementation via `sqlx` lives behind the `database` feature.

pub mod memory;

#[cfg(feature = "database")]
pub mod sqlite;

use crate::models::{
    AuditPeriod, BreakEvent, BreakStatus, CheckRun, DataAsset, DataSource, IntegrityCheck,
    LineageEdge, RiskScore, RunClaim, Severity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStores;

#[cfg(feature = "database")]
pub use sqlite::SqliteStores;

/// Errors surfaced by repository operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found.
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Uniqueness or foreign-key violation.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Optimistic-concurrency conflict; the caller may retry.
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend failure (connection lost, corrupt file, ...).
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    StoreError::Constraint(db_err.message().to_string())
                } else {
                    StoreError::Backend(db_err.message().to_string())
                }
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Filter for asset listings.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    /// Only assets fed by this source.
    pub source_id: Option<Uuid>,
    /// Only assets with `origin_unknown = true`.
    pub orphans_only: bool,
    /// Include soft-deactivated assets.
    pub include_inactive: bool,
}

/// Filter for break event listings.
#[derive(Debug, Clone, Default)]
pub struct BreakFilter {
    pub status: Option<BreakStatus>,
    pub severity: Option<Severity>,
    pub asset_id: Option<Uuid>,
    /// Maximum number of events, newest first.
    pub limit: Option<usize>,
}

/// Filter for check listings.
#[derive(Debug, Clone, Default)]
pub struct CheckFilter {
    pub asset_id: Option<Uuid>,
    /// Only checks whose last result was `fail` or `error`.
    pub failed_only: bool,
}

/// Repository for data sources. Name is unique per tenant.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn insert(&self, source: &DataSource) -> Result<(), StoreError>;
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DataSource>, StoreError>;
    async fn find_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<DataSource>, StoreError>;
    async fn list(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<DataSource>, StoreError>;
    async fn update(&self, source: &DataSource) -> Result<(), StoreError>;
}

/// Repository for data assets. `(tenant, name, version)` is unique.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn insert(&self, asset: &DataAsset) -> Result<(), StoreError>;
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DataAsset>, StoreError>;
    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &AssetFilter,
    ) -> Result<Vec<DataAsset>, StoreError>;
    /// Highest existing version for `(tenant, name)`, if any.
    async fn max_version(&self, tenant_id: Uuid, name: &str) -> Result<Option<i64>, StoreError>;
    async fn update(&self, asset: &DataAsset) -> Result<(), StoreError>;
}

/// Repository for lineage edges. `(tenant, source, target, kind)` is unique
/// among active edges.
#[async_trait]
pub trait EdgeStore: Send + Sync {
    async fn insert(&self, edge: &LineageEdge) -> Result<(), StoreError>;
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<LineageEdge>, StoreError>;
    /// Finds the active edge with this exact `(source, target, kind)` triple.
    async fn find_active(
        &self,
        tenant_id: Uuid,
        source: Uuid,
        target: Uuid,
        kind: crate::models::EdgeKind,
    ) -> Result<Option<LineageEdge>, StoreError>;
    /// All active edges of the tenant subgraph.
    async fn list_active(&self, tenant_id: Uuid) -> Result<Vec<LineageEdge>, StoreError>;
    /// Active edges pointing into `asset_id`.
    async fn inbound(&self, tenant_id: Uuid, asset_id: Uuid)
        -> Result<Vec<LineageEdge>, StoreError>;
    /// Active edges pointing out of `asset_id`.
    async fn outbound(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<LineageEdge>, StoreError>;
    async fn update(&self, edge: &LineageEdge) -> Result<(), StoreError>;
}

/// Repository for integrity checks, their claims, and the run history.
#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn insert(&self, check: &IntegrityCheck) -> Result<(), StoreError>;
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<IntegrityCheck>, StoreError>;
    async fn find_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<IntegrityCheck>, StoreError>;
    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &CheckFilter,
    ) -> Result<Vec<IntegrityCheck>, StoreError>;
    async fn update(&self, check: &IntegrityCheck) -> Result<(), StoreError>;
    /// Active scheduled checks whose slot has arrived as of `now`.
    async fn due(&self, tenant_id: Uuid, now: DateTime<Utc>)
        -> Result<Vec<IntegrityCheck>, StoreError>;
    /// Atomically claims a scheduled slot. Returns `false` when another
    /// worker already holds a live claim for the same slot.
    async fn claim(
        &self,
        tenant_id: Uuid,
        check_id: Uuid,
        claim: &RunClaim,
    ) -> Result<bool, StoreError>;
    /// Clears the claim if `owner_token` still holds it.
    async fn release(
        &self,
        tenant_id: Uuid,
        check_id: Uuid,
        owner_token: Uuid,
    ) -> Result<(), StoreError>;
    /// Appends a run to the history.
    async fn record_run(&self, run: &CheckRun) -> Result<(), StoreError>;
    /// Runs targeting `asset_id` since the given instant, for risk lookbacks.
    async fn runs_for_asset(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckRun>, StoreError>;
}

/// Repository for break events.
#[async_trait]
pub trait BreakStore: Send + Sync {
    async fn insert(&self, event: &BreakEvent) -> Result<(), StoreError>;
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<BreakEvent>, StoreError>;
    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &BreakFilter,
    ) -> Result<Vec<BreakEvent>, StoreError>;
    /// Currently-open events for an asset, for risk penalties.
    async fn open_for_asset(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<BreakEvent>, StoreError>;
    async fn update(&self, event: &BreakEvent) -> Result<(), StoreError>;
}

/// Append-only repository for risk score snapshots.
#[async_trait]
pub trait RiskStore: Send + Sync {
    /// Appends a new snapshot; prior snapshots are never mutated.
    async fn append(&self, score: &RiskScore) -> Result<(), StoreError>;
    /// Latest snapshot by `computed_at` for one asset.
    async fn latest(&self, tenant_id: Uuid, asset_id: Uuid)
        -> Result<Option<RiskScore>, StoreError>;
    /// Latest snapshot per asset with `overall_score >= min_score`,
    /// highest first.
    async fn latest_per_asset(
        &self,
        tenant_id: Uuid,
        min_score: u8,
    ) -> Result<Vec<RiskScore>, StoreError>;
    /// Full history for one asset, newest first.
    async fn history(&self, tenant_id: Uuid, asset_id: Uuid)
        -> Result<Vec<RiskScore>, StoreError>;
}

/// Repository for audit periods.
#[async_trait]
pub trait PeriodStore: Send + Sync {
    async fn insert(&self, period: &AuditPeriod) -> Result<(), StoreError>;
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditPeriod>, StoreError>;
    /// The period whose window covers `at`, if one is recorded.
    async fn covering(
        &self,
        tenant_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<AuditPeriod>, StoreError>;
    async fn update(&self, period: &AuditPeriod) -> Result<(), StoreError>;
}
