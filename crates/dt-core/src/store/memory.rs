//! In-memory store implementations.
//!
//! Backed by `Arc<RwLock<HashMap>>`, used by the test suites and as the
//! default backend for embedded deployments. Uniqueness constraints are
//! enforced here exactly as the SQL layer enforces them.

use super::{
    AssetFilter, AssetStore, BreakFilter, BreakStore, CheckFilter, CheckStore, EdgeStore,
    PeriodStore, RiskStore, SourceStore, StoreError,
};
use crate::models::{
    AuditPeriod, BreakEvent, CheckResult, CheckRun, DataAsset, DataSource, EdgeKind,
    IntegrityCheck, LineageEdge, RiskScore, RunClaim,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory `SourceStore`.
#[derive(Default)]
pub struct MemorySourceStore {
    rows: Arc<RwLock<HashMap<Uuid, DataSource>>>,
}

impl MemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn insert(&self, source: &DataSource) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|s| s.tenant_id == source.tenant_id && s.name == source.name)
        {
            return Err(StoreError::Constraint(format!(
                "source name '{}' already exists for tenant",
                source.name
            )));
        }
        rows.insert(source.id, source.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DataSource>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|s| s.tenant_id == tenant_id).cloned())
    }

    async fn find_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<DataSource>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|s| s.tenant_id == tenant_id && s.name == name)
            .cloned())
    }

    async fn list(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<DataSource>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<DataSource> = rows
            .values()
            .filter(|s| s.tenant_id == tenant_id && (!active_only || s.active))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update(&self, source: &DataSource) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&source.id) {
            Some(existing) if existing.tenant_id == source.tenant_id => {
                *existing = source.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "data_source".into(),
                id: source.id.to_string(),
            }),
        }
    }
}

/// In-memory `AssetStore`.
#[derive(Default)]
pub struct MemoryAssetStore {
    rows: Arc<RwLock<HashMap<Uuid, DataAsset>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn insert(&self, asset: &DataAsset) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|a| {
            a.tenant_id == asset.tenant_id && a.name == asset.name && a.version == asset.version
        }) {
            return Err(StoreError::Constraint(format!(
                "asset ('{}', v{}) already exists for tenant",
                asset.name, asset.version
            )));
        }
        rows.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DataAsset>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|a| a.tenant_id == tenant_id).cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &AssetFilter,
    ) -> Result<Vec<DataAsset>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<DataAsset> = rows
            .values()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && (filter.include_inactive || a.active)
                    && filter.source_id.map(|s| a.source_id == Some(s)).unwrap_or(true)
                    && (!filter.orphans_only || a.origin_unknown)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn max_version(&self, tenant_id: Uuid, name: &str) -> Result<Option<i64>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.name == name)
            .map(|a| a.version)
            .max())
    }

    async fn update(&self, asset: &DataAsset) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&asset.id) {
            Some(existing) if existing.tenant_id == asset.tenant_id => {
                *existing = asset.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "data_asset".into(),
                id: asset.id.to_string(),
            }),
        }
    }
}

/// In-memory `EdgeStore`.
#[derive(Default)]
pub struct MemoryEdgeStore {
    rows: Arc<RwLock<HashMap<Uuid, LineageEdge>>>,
}

impl MemoryEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EdgeStore for MemoryEdgeStore {
    async fn insert(&self, edge: &LineageEdge) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|e| {
            e.tenant_id == edge.tenant_id
                && e.active
                && e.source_asset_id == edge.source_asset_id
                && e.target_asset_id == edge.target_asset_id
                && e.kind == edge.kind
        }) {
            return Err(StoreError::Constraint(
                "active edge with same (source, target, kind) exists".into(),
            ));
        }
        rows.insert(edge.id, edge.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<LineageEdge>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|e| e.tenant_id == tenant_id).cloned())
    }

    async fn find_active(
        &self,
        tenant_id: Uuid,
        source: Uuid,
        target: Uuid,
        kind: EdgeKind,
    ) -> Result<Option<LineageEdge>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|e| {
                e.tenant_id == tenant_id
                    && e.active
                    && e.source_asset_id == source
                    && e.target_asset_id == target
                    && e.kind == kind
            })
            .cloned())
    }

    async fn list_active(&self, tenant_id: Uuid) -> Result<Vec<LineageEdge>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.active)
            .cloned()
            .collect())
    }

    async fn inbound(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<LineageEdge>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.active && e.target_asset_id == asset_id)
            .cloned()
            .collect())
    }

    async fn outbound(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<LineageEdge>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.active && e.source_asset_id == asset_id)
            .cloned()
            .collect())
    }

    async fn update(&self, edge: &LineageEdge) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&edge.id) {
            Some(existing) if existing.tenant_id == edge.tenant_id => {
                *existing = edge.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "lineage_edge".into(),
                id: edge.id.to_string(),
            }),
        }
    }
}

/// In-memory `CheckStore`, including the run history.
#[derive(Default)]
pub struct MemoryCheckStore {
    rows: Arc<RwLock<HashMap<Uuid, IntegrityCheck>>>,
    runs: Arc<RwLock<Vec<CheckRun>>>,
}

impl MemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckStore for MemoryCheckStore {
    async fn insert(&self, check: &IntegrityCheck) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|c| c.tenant_id == check.tenant_id && c.name == check.name)
        {
            return Err(StoreError::Constraint(format!(
                "check name '{}' already exists for tenant",
                check.name
            )));
        }
        rows.insert(check.id, check.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<IntegrityCheck>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|c| c.tenant_id == tenant_id).cloned())
    }

    async fn find_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<IntegrityCheck>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|c| c.tenant_id == tenant_id && c.name == name)
            .cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &CheckFilter,
    ) -> Result<Vec<IntegrityCheck>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<IntegrityCheck> = rows
            .values()
            .filter(|c| {
                c.tenant_id == tenant_id
                    && c.active
                    && filter.asset_id.map(|a| c.asset_id == Some(a)).unwrap_or(true)
                    && (!filter.failed_only
                        || matches!(
                            c.last_result,
                            Some(CheckResult::Fail) | Some(CheckResult::Error)
                        ))
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn update(&self, check: &IntegrityCheck) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&check.id) {
            Some(existing) if existing.tenant_id == check.tenant_id => {
                *existing = check.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "integrity_check".into(),
                id: check.id.to_string(),
            }),
        }
    }

    async fn due(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<IntegrityCheck>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.is_due(now))
            .cloned()
            .collect())
    }

    async fn claim(
        &self,
        tenant_id: Uuid,
        check_id: Uuid,
        claim: &RunClaim,
    ) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        let check = rows
            .get_mut(&check_id)
            .filter(|c| c.tenant_id == tenant_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "integrity_check".into(),
                id: check_id.to_string(),
            })?;
        // A live claim for the same slot blocks a second worker.
        if let Some(existing) = &check.claim {
            if existing.slot == claim.slot && !existing.is_expired() {
                return Ok(false);
            }
        }
        check.claim = Some(claim.clone());
        check.updated_at = Utc::now();
        Ok(true)
    }

    async fn release(
        &self,
        tenant_id: Uuid,
        check_id: Uuid,
        owner_token: Uuid,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if let Some(check) = rows.get_mut(&check_id).filter(|c| c.tenant_id == tenant_id) {
            if check
                .claim
                .as_ref()
                .map(|c| c.owner_token == owner_token)
                .unwrap_or(false)
            {
                check.claim = None;
                check.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn record_run(&self, run: &CheckRun) -> Result<(), StoreError> {
        self.runs.write().await.push(run.clone());
        Ok(())
    }

    async fn runs_for_asset(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckRun>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.asset_id == Some(asset_id)
                    && r.finished_at >= since
            })
            .cloned()
            .collect())
    }
}

/// In-memory `BreakStore`.
#[derive(Default)]
pub struct MemoryBreakStore {
    rows: Arc<RwLock<HashMap<Uuid, BreakEvent>>>,
}

impl MemoryBreakStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BreakStore for MemoryBreakStore {
    async fn insert(&self, event: &BreakEvent) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&event.id) {
            return Err(StoreError::Constraint(format!(
                "break event {} already exists",
                event.id
            )));
        }
        rows.insert(event.id, event.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<BreakEvent>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|e| e.tenant_id == tenant_id).cloned())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &BreakFilter,
    ) -> Result<Vec<BreakEvent>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<BreakEvent> = rows
            .values()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && filter.status.map(|s| e.status == s).unwrap_or(true)
                    && filter.severity.map(|s| e.severity == s).unwrap_or(true)
                    && filter.asset_id.map(|a| e.asset_id == Some(a)).unwrap_or(true)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn open_for_asset(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<BreakEvent>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.asset_id == Some(asset_id)
                    && !e.status.is_terminal()
            })
            .cloned()
            .collect())
    }

    async fn update(&self, event: &BreakEvent) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&event.id) {
            Some(existing) if existing.tenant_id == event.tenant_id => {
                *existing = event.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "break_event".into(),
                id: event.id.to_string(),
            }),
        }
    }
}

/// In-memory, append-only `RiskStore`.
#[derive(Default)]
pub struct MemoryRiskStore {
    rows: Arc<RwLock<Vec<RiskScore>>>,
}

impl MemoryRiskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RiskStore for MemoryRiskStore {
    async fn append(&self, score: &RiskScore) -> Result<(), StoreError> {
        self.rows.write().await.push(score.clone());
        Ok(())
    }

    async fn latest(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Option<RiskScore>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.asset_id == asset_id)
            .max_by_key(|s| s.computed_at)
            .cloned())
    }

    async fn latest_per_asset(
        &self,
        tenant_id: Uuid,
        min_score: u8,
    ) -> Result<Vec<RiskScore>, StoreError> {
        let rows = self.rows.read().await;
        let mut latest: HashMap<Uuid, RiskScore> = HashMap::new();
        for score in rows.iter().filter(|s| s.tenant_id == tenant_id) {
            match latest.get(&score.asset_id) {
                Some(existing) if existing.computed_at >= score.computed_at => {}
                _ => {
                    latest.insert(score.asset_id, score.clone());
                }
            }
        }
        let mut out: Vec<RiskScore> = latest
            .into_values()
            .filter(|s| s.overall_score >= min_score)
            .collect();
        out.sort_by(|a, b| b.overall_score.cmp(&a.overall_score));
        Ok(out)
    }

    async fn history(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<RiskScore>, StoreError> {
        let rows = self.rows.read().await;
        let mut out: Vec<RiskScore> = rows
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.asset_id == asset_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.computed_at.cmp(&a.computed_at));
        Ok(out)
    }
}

/// In-memory `PeriodStore`.
#[derive(Default)]
pub struct MemoryPeriodStore {
    rows: Arc<RwLock<HashMap<Uuid, AuditPeriod>>>,
}

impl MemoryPeriodStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PeriodStore for MemoryPeriodStore {
    async fn insert(&self, period: &AuditPeriod) -> Result<(), StoreError> {
        self.rows.write().await.insert(period.id, period.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditPeriod>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).filter(|p| p.tenant_id == tenant_id).cloned())
    }

    async fn covering(
        &self,
        tenant_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<AuditPeriod>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|p| p.tenant_id == tenant_id && p.covers(at))
            .cloned())
    }

    async fn update(&self, period: &AuditPeriod) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&period.id) {
            Some(existing) if existing.tenant_id == period.tenant_id => {
                *existing = period.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "audit_period".into(),
                id: period.id.to_string(),
            }),
        }
    }
}

/// Bundle of in-memory stores wired together for one engine instance.
#[derive(Clone)]
pub struct MemoryStores {
    pub sources: Arc<MemorySourceStore>,
    pub assets: Arc<MemoryAssetStore>,
    pub edges: Arc<MemoryEdgeStore>,
    pub checks: Arc<MemoryCheckStore>,
    pub breaks: Arc<MemoryBreakStore>,
    pub risks: Arc<MemoryRiskStore>,
    pub periods: Arc<MemoryPeriodStore>,
}

impl Default for MemoryStores {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStores {
    pub fn new() -> Self {
        Self {
            sources: Arc::new(MemorySourceStore::new()),
            assets: Arc::new(MemoryAssetStore::new()),
            edges: Arc::new(MemoryEdgeStore::new()),
            checks: Arc::new(MemoryCheckStore::new()),
            breaks: Arc::new(MemoryBreakStore::new()),
            risks: Arc::new(MemoryRiskStore::new()),
            periods: Arc::new(MemoryPeriodStore::new()),
        }
    }
}
