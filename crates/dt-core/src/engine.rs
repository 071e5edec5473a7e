//! Engine facade.
//!
//! Wires the registry, graph, check, break, and risk components over one
//! set of stores and orchestrates the cross-component triggers: a completed
//! check, a break transition, or a scheduler pass recomputes the risk score
//! of every asset it touched. Reporting collaborators subscribe to the
//! event bus instead.

use crate::audit::AuditTrail;
use crate::breaks::BreakDetector;
use crate::checks::{CheckEngine, DataProbe};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::graph::{EdgeRequest, LineageGraph};
use crate::models::{BreakEvent, BreakStatus, CheckRun, EdgeOutcome, RiskScore};
use crate::registry::AssetRegistry;
use crate::risk::RiskEngine;
use crate::store::{
    AssetStore, BreakStore, CheckStore, EdgeStore, MemoryStores, PeriodStore, RiskStore,
    SourceStore,
};
use crate::tenant::TenantContext;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::instrument;
use uuid::Uuid;

/// The store handles the engine runs on.
#[derive(Clone)]
pub struct EngineStores {
    pub sources: Arc<dyn SourceStore>,
    pub assets: Arc<dyn AssetStore>,
    pub edges: Arc<dyn EdgeStore>,
    pub checks: Arc<dyn CheckStore>,
    pub breaks: Arc<dyn BreakStore>,
    pub risks: Arc<dyn RiskStore>,
    pub periods: Arc<dyn PeriodStore>,
}

impl EngineStores {
    /// In-memory backend, for tests and local development.
    pub fn in_memory() -> Self {
        MemoryStores::new().into()
    }
}

impl From<MemoryStores> for EngineStores {
    fn from(stores: MemoryStores) -> Self {
        Self {
            sources: stores.sources,
            assets: stores.assets,
            edges: stores.edges,
            checks: stores.checks,
            breaks: stores.breaks,
            risks: stores.risks,
            periods: stores.periods,
        }
    }
}

/// Facade over the five engine components.
pub struct TrailEngine {
    registry: AssetRegistry,
    graph: LineageGraph,
    checks: CheckEngine,
    detector: Arc<BreakDetector>,
    risk: RiskEngine,
    audit: Arc<AuditTrail>,
    bus: EventBus,
}

impl TrailEngine {
    pub fn new(stores: EngineStores, probe: Arc<dyn DataProbe>, config: EngineConfig) -> Self {
        let audit = Arc::new(AuditTrail::default());
        let bus = EventBus::default();
        let detector = Arc::new(BreakDetector::new(
            stores.breaks.clone(),
            stores.assets.clone(),
            audit.clone(),
            bus.clone(),
            config.clone(),
        ));
        let registry = AssetRegistry::new(
            stores.sources.clone(),
            stores.assets.clone(),
            audit.clone(),
        );
        let graph = LineageGraph::new(
            stores.edges.clone(),
            stores.assets.clone(),
            stores.periods.clone(),
            detector.clone(),
            audit.clone(),
            bus.clone(),
            config.clone(),
        );
        let checks = CheckEngine::new(
            stores.checks.clone(),
            stores.assets.clone(),
            stores.edges.clone(),
            probe,
            detector.clone(),
            audit.clone(),
            bus.clone(),
            config.clone(),
        );
        let risk = RiskEngine::new(
            stores.risks.clone(),
            stores.breaks.clone(),
            stores.checks.clone(),
            audit.clone(),
            bus.clone(),
            config,
        );
        Self {
            registry,
            graph,
            checks,
            detector,
            risk,
            audit,
            bus,
        }
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    pub fn checks(&self) -> &CheckEngine {
        &self.checks
    }

    pub fn breaks(&self) -> &BreakDetector {
        &self.detector
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Subscribes to engine event notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    /// Creates a lineage edge. A rejected cycle still recomputes the target
    /// asset's score, since the rejection recorded a break event against it.
    pub async fn create_edge(
        &self,
        ctx: &TenantContext,
        request: EdgeRequest,
    ) -> Result<EdgeOutcome, EngineError> {
        let target = request.target_asset_id;
        match self.graph.create_edge(ctx, request).await {
            Err(err @ EngineError::CycleDetected { .. }) => {
                self.risk.recompute(ctx, target).await?;
                Err(err)
            }
            other => other,
        }
    }

    /// Runs one check now and refreshes the target asset's risk score.
    pub async fn run_check(
        &self,
        ctx: &TenantContext,
        check_id: Uuid,
    ) -> Result<CheckRun, EngineError> {
        let run = self.checks.run_check(ctx, check_id).await?;
        if let Some(asset_id) = run.asset_id {
            self.risk.recompute(ctx, asset_id).await?;
        }
        Ok(run)
    }

    /// Transitions a break event and refreshes the affected asset's score;
    /// closing an event lifts its penalty immediately.
    pub async fn transition_break(
        &self,
        ctx: &TenantContext,
        event_id: Uuid,
        to: BreakStatus,
        notes: Option<String>,
    ) -> Result<BreakEvent, EngineError> {
        let event = self.detector.transition(ctx, event_id, to, notes).await?;
        if let Some(asset_id) = event.asset_id {
            self.risk.recompute(ctx, asset_id).await?;
        }
        Ok(event)
    }

    /// Forces a risk recomputation for one asset.
    pub async fn recompute_risk(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<RiskScore, EngineError> {
        self.risk.recompute(ctx, asset_id).await
    }

    /// One scheduler pass: executes every due check this worker can claim,
    /// sweeps for overdue orphans, and recomputes scores for every asset
    /// touched by either. Intended to be driven from a periodic task.
    #[instrument(skip(self, ctx), fields(tenant = %ctx.tenant_id))]
    pub async fn run_scheduler_once(
        &self,
        ctx: &TenantContext,
        now: DateTime<Utc>,
    ) -> Result<SchedulerPass, EngineError> {
        let runs = self.checks.run_due(ctx, now).await?;
        let orphan_events = self.detector.sweep_orphans(ctx).await?;

        let mut touched: HashSet<Uuid> = HashSet::new();
        touched.extend(runs.iter().filter_map(|r| r.asset_id));
        touched.extend(orphan_events.iter().filter_map(|e| e.asset_id));
        let mut scores = Vec::with_capacity(touched.len());
        for asset_id in touched {
            scores.push(self.risk.recompute(ctx, asset_id).await?);
        }
        Ok(SchedulerPass {
            runs,
            orphan_events,
            scores,
        })
    }
}

/// Outcome of one scheduler pass.
pub struct SchedulerPass {
    pub runs: Vec<CheckRun>,
    pub orphan_events: Vec<BreakEvent>,
    pub scores: Vec<RiskScore>,
}
