//! Lineage graph engine.
//!
//! Owns `LineageEdge` records and is the only component allowed to accept or
//! reject edge mutations. The edge set is kept acyclic at all times: every
//! candidate edge is checked against the committed subgraph before insert,
//! under a per-tenant mutation lock so the validate-then-insert window cannot
//! race a concurrent writer into a cycle.
//!
//! Edges and vertices are referenced by id throughout; traversal builds a
//! transient adjacency map from the active edge list rather than holding
//! live references between records.

use crate::audit::{AuditEntry, AuditEventType, AuditTrail};
use crate::breaks::BreakDetector;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::models::{DataAsset, Direction, EdgeKind, EdgeOutcome, LineageEdge, PeriodStatus};
use crate::store::{AssetStore, EdgeStore, PeriodStore, StoreError};
use crate::tenant::{Role, TenantContext};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Request to create a lineage edge.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub source_asset_id: Uuid,
    pub target_asset_id: Uuid,
    pub kind: EdgeKind,
    pub transformation_note: Option<String>,
    /// Admin-only justification for writing into a closed audit period.
    pub period_override_reason: Option<String>,
}

impl EdgeRequest {
    pub fn new(source: Uuid, target: Uuid, kind: EdgeKind) -> Self {
        Self {
            source_asset_id: source,
            target_asset_id: target,
            kind,
            transformation_note: None,
            period_override_reason: None,
        }
    }
}

pub struct LineageGraph {
    edges: Arc<dyn EdgeStore>,
    assets: Arc<dyn AssetStore>,
    periods: Arc<dyn PeriodStore>,
    detector: Arc<BreakDetector>,
    audit: Arc<AuditTrail>,
    bus: EventBus,
    config: EngineConfig,
    /// One mutation lock per tenant; reads never take it.
    tenant_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LineageGraph {
    pub fn new(
        edges: Arc<dyn EdgeStore>,
        assets: Arc<dyn AssetStore>,
        periods: Arc<dyn PeriodStore>,
        detector: Arc<BreakDetector>,
        audit: Arc<AuditTrail>,
        bus: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            edges,
            assets,
            periods,
            detector,
            audit,
            bus,
            config,
            tenant_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn mutation_lock(&self, tenant_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.tenant_locks.lock().await;
        locks.entry(tenant_id).or_default().clone()
    }

    /// Creates a lineage edge after running the full validation ladder:
    /// self-loop, duplicate, closed-period membership, then acyclicity
    /// against the committed subgraph. A duplicate of an existing active
    /// edge is not an error; the existing edge is returned with
    /// `created: false`. A rejected cycle leaves the edge set untouched
    /// and records a `cycle_detected` break event.
    #[instrument(skip(self, ctx, request), fields(tenant = %ctx.tenant_id))]
    pub async fn create_edge(
        &self,
        ctx: &TenantContext,
        request: EdgeRequest,
    ) -> Result<EdgeOutcome, EngineError> {
        ctx.require(Role::Member)?;
        let lock = self.mutation_lock(ctx.tenant_id).await;
        let _guard = lock.lock().await;

        match self.create_edge_locked(ctx, &request).await {
            // A concurrent writer on another store handle may still collide;
            // one retry under the lock, then the conflict surfaces.
            Err(EngineError::Store(StoreError::Conflict(_))) => self
                .create_edge_locked(ctx, &request)
                .await
                .map_err(|err| match err {
                    EngineError::Store(StoreError::Conflict(_)) => {
                        EngineError::ConcurrencyConflict
                    }
                    other => other,
                }),
            other => other,
        }
    }

    async fn create_edge_locked(
        &self,
        ctx: &TenantContext,
        request: &EdgeRequest,
    ) -> Result<EdgeOutcome, EngineError> {
        if request.source_asset_id == request.target_asset_id {
            return Err(EngineError::SelfLoop {
                asset_id: request.source_asset_id,
            });
        }

        let source = self
            .require_asset(ctx.tenant_id, request.source_asset_id)
            .await?;
        let mut target = self
            .require_asset(ctx.tenant_id, request.target_asset_id)
            .await?;

        if let Some(existing) = self
            .edges
            .find_active(
                ctx.tenant_id,
                request.source_asset_id,
                request.target_asset_id,
                request.kind,
            )
            .await?
        {
            debug!(edge = %existing.id, "duplicate edge request; returning existing");
            return Ok(EdgeOutcome {
                edge: existing,
                created: false,
            });
        }

        // Unknown-origin data must not propagate: classify the source first.
        if source.origin_unknown {
            return Err(EngineError::OrphanPropagationBlocked {
                asset_id: source.id,
            });
        }

        self.check_period(ctx, request, &source, &target).await?;

        let active = self.edges.list_active(ctx.tenant_id).await?;
        if would_cycle(
            &active,
            request.source_asset_id,
            request.target_asset_id,
            self.config.max_traversal_depth as usize,
        ) {
            self.detector
                .report_cycle(ctx, request.source_asset_id, request.target_asset_id)
                .await?;
            return Err(EngineError::CycleDetected {
                source_id: request.source_asset_id,
                target_id: request.target_asset_id,
            });
        }

        let mut edge = LineageEdge::new(
            ctx.tenant_id,
            request.source_asset_id,
            request.target_asset_id,
            request.kind,
            ctx.actor_id,
        );
        edge.transformation_note = request.transformation_note.clone();
        self.edges.insert(&edge).await?;

        // A first inbound edge settles the target's origin.
        if target.origin_unknown {
            target.origin_unknown = false;
            target.updated_at = Utc::now();
            self.assets.update(&target).await?;
        }

        info!(edge = %edge.id, kind = %edge.kind, "lineage edge created");
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::EdgeCreated,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "lineage_edge",
                    edge.id,
                    format!("{} -{}-> {}", source.name, edge.kind, target.name),
                )
                .with_details(serde_json::json!({
                    "source_asset_id": edge.source_asset_id,
                    "target_asset_id": edge.target_asset_id,
                    "kind": edge.kind.as_db_str(),
                })),
            )
            .await;
        self.bus.publish(EngineEvent::EdgeCreated {
            tenant_id: ctx.tenant_id,
            edge_id: edge.id,
        });
        Ok(EdgeOutcome {
            edge,
            created: true,
        })
    }

    /// Rejects writes that fall inside a closed audit period unless an
    /// admin supplies an override reason, which is recorded unconditionally.
    async fn check_period(
        &self,
        ctx: &TenantContext,
        request: &EdgeRequest,
        source: &DataAsset,
        target: &DataAsset,
    ) -> Result<(), EngineError> {
        for asset in [source, target] {
            let Some(period) = self
                .periods
                .covering(ctx.tenant_id, asset.created_at)
                .await?
            else {
                continue;
            };
            if period.status != PeriodStatus::Closed {
                continue;
            }
            match &request.period_override_reason {
                Some(reason) if ctx.role >= Role::Admin => {
                    self.detector
                        .record_period_override(ctx, asset.id, &period.name, reason)
                        .await?;
                }
                _ => {
                    return Err(EngineError::PeriodClosed {
                        period: period.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Soft-deactivates an edge. If this removes the target's last inbound
    /// edge its origin becomes unknown again.
    #[instrument(skip(self, ctx), fields(tenant = %ctx.tenant_id))]
    pub async fn deactivate_edge(
        &self,
        ctx: &TenantContext,
        edge_id: Uuid,
    ) -> Result<LineageEdge, EngineError> {
        ctx.require(Role::Member)?;
        let lock = self.mutation_lock(ctx.tenant_id).await;
        let _guard = lock.lock().await;

        let mut edge = self.require_edge(ctx.tenant_id, edge_id).await?;
        if edge.active {
            edge.active = false;
            self.edges.update(&edge).await?;

            let inbound = self
                .edges
                .inbound(ctx.tenant_id, edge.target_asset_id)
                .await?;
            if inbound.is_empty() {
                if let Some(mut target) = self
                    .assets
                    .get(ctx.tenant_id, edge.target_asset_id)
                    .await?
                {
                    target.origin_unknown = true;
                    target.updated_at = Utc::now();
                    self.assets.update(&target).await?;
                }
            }
        }
        self.audit
            .record(AuditEntry::new(
                AuditEventType::EdgeDeactivated,
                ctx.tenant_id,
                ctx.actor_id,
                "lineage_edge",
                edge.id,
                "Edge deactivated".to_string(),
            ))
            .await;
        self.bus.publish(EngineEvent::EdgeDeactivated {
            tenant_id: ctx.tenant_id,
            edge_id: edge.id,
        });
        Ok(edge)
    }

    /// Marks an edge reviewed-and-correct. Admin only.
    pub async fn validate_edge(
        &self,
        ctx: &TenantContext,
        edge_id: Uuid,
    ) -> Result<LineageEdge, EngineError> {
        ctx.require(Role::Admin)?;
        let mut edge = self.require_edge(ctx.tenant_id, edge_id).await?;
        edge.validated = true;
        edge.validated_by = Some(ctx.actor_id);
        edge.validated_at = Some(Utc::now());
        self.edges.update(&edge).await?;
        self.audit
            .record(AuditEntry::new(
                AuditEventType::EdgeValidated,
                ctx.tenant_id,
                ctx.actor_id,
                "lineage_edge",
                edge.id,
                "Edge validated".to_string(),
            ))
            .await;
        Ok(edge)
    }

    /// Breadth-first lineage from `asset_id` in the given direction. Each
    /// edge appears at most once; the walk is visited-set cycle-safe and
    /// bounded by `max_depth` (capped by configuration). Legacy cycles in
    /// the reached subgraph are possible only through writes outside the
    /// engine; crossing one flags its edges for remediation.
    pub async fn traverse(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> Result<Vec<LineageEdge>, EngineError> {
        ctx.require(Role::Viewer)?;
        self.require_asset(ctx.tenant_id, asset_id).await?;

        let cap = self.config.max_traversal_depth as usize;
        let depth_limit = max_depth.map(|d| d.min(cap)).unwrap_or(cap);
        let active = self.edges.list_active(ctx.tenant_id).await?;
        let mut adjacency: HashMap<Uuid, Vec<&LineageEdge>> = HashMap::new();
        for edge in &active {
            let from = match direction {
                Direction::Downstream => edge.source_asset_id,
                Direction::Upstream => edge.target_asset_id,
            };
            adjacency.entry(from).or_default().push(edge);
        }

        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut result = Vec::new();
        let mut queue: VecDeque<(Uuid, usize)> = VecDeque::new();
        visited.insert(asset_id);
        queue.push_back((asset_id, 0));
        while let Some((vertex, depth)) = queue.pop_front() {
            if depth >= depth_limit {
                continue;
            }
            for edge in adjacency.get(&vertex).into_iter().flatten() {
                let next = match direction {
                    Direction::Downstream => edge.target_asset_id,
                    Direction::Upstream => edge.source_asset_id,
                };
                result.push((*edge).clone());
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        for edge in cyclic_edges(&result) {
            warn!(edge = %edge.id, "traversal crossed a pre-existing cycle");
            self.detector
                .report_cycle(ctx, edge.source_asset_id, edge.target_asset_id)
                .await?;
        }
        Ok(result)
    }

    /// All active edges of the tenant subgraph.
    pub async fn list_edges(&self, ctx: &TenantContext) -> Result<Vec<LineageEdge>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self.edges.list_active(ctx.tenant_id).await?)
    }

    async fn require_asset(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<DataAsset, EngineError> {
        self.assets
            .get(tenant_id, asset_id)
            .await?
            .filter(|a| a.active)
            .ok_or(EngineError::MissingTarget)
    }

    async fn require_edge(
        &self,
        tenant_id: Uuid,
        edge_id: Uuid,
    ) -> Result<LineageEdge, EngineError> {
        self.edges
            .get(tenant_id, edge_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "lineage_edge",
                id: edge_id,
            })
    }
}

/// Depth-first reachability over the active edge set: the candidate edge
/// `source -> target` closes a cycle exactly when `source` is reachable
/// from `target`.
fn would_cycle(active: &[LineageEdge], source: Uuid, target: Uuid, max_depth: usize) -> bool {
    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for edge in active {
        adjacency
            .entry(edge.source_asset_id)
            .or_default()
            .push(edge.target_asset_id);
    }
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut stack = vec![(target, 0usize)];
    while let Some((vertex, depth)) = stack.pop() {
        if vertex == source {
            return true;
        }
        if depth >= max_depth || !visited.insert(vertex) {
            continue;
        }
        for next in adjacency.get(&vertex).into_iter().flatten() {
            stack.push((*next, depth + 1));
        }
    }
    false
}

/// Edges that lie on a directed cycle: iteratively prune edges whose
/// source has no inbound edge or whose target has no outbound edge until
/// a fixpoint; what survives is the cyclic core. Empty for any edge set
/// produced through `create_edge`.
fn cyclic_edges(edges: &[LineageEdge]) -> Vec<&LineageEdge> {
    let mut remaining: Vec<&LineageEdge> = edges.iter().collect();
    loop {
        let sources_with_inbound: HashSet<Uuid> =
            remaining.iter().map(|e| e.target_asset_id).collect();
        let targets_with_outbound: HashSet<Uuid> =
            remaining.iter().map(|e| e.source_asset_id).collect();
        let before = remaining.len();
        remaining.retain(|e| {
            sources_with_inbound.contains(&e.source_asset_id)
                && targets_with_outbound.contains(&e.target_asset_id)
        });
        if remaining.len() == before {
            return remaining;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetKind, BreakKind};
    use crate::store::memory::MemoryStores;
    use crate::store::{BreakFilter, BreakStore};

    struct Fixture {
        graph: LineageGraph,
        stores: MemoryStores,
        ctx: TenantContext,
    }

    fn fixture() -> Fixture {
        let stores = MemoryStores::new();
        let audit = Arc::new(AuditTrail::default());
        let bus = EventBus::default();
        let detector = Arc::new(BreakDetector::new(
            stores.breaks.clone(),
            stores.assets.clone(),
            audit.clone(),
            bus.clone(),
            EngineConfig::default(),
        ));
        let graph = LineageGraph::new(
            stores.edges.clone(),
            stores.assets.clone(),
            stores.periods.clone(),
            detector,
            audit,
            bus,
            EngineConfig::default(),
        );
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin);
        Fixture { graph, stores, ctx }
    }

    async fn seed_asset(fix: &Fixture, name: &str, origin_unknown: bool) -> DataAsset {
        let mut asset = DataAsset::new(fix.ctx.tenant_id, name, AssetKind::Table, fix.ctx.actor_id);
        asset.origin_unknown = origin_unknown;
        fix.stores.assets.insert(&asset).await.unwrap();
        asset
    }

    async fn link(fix: &Fixture, source: &DataAsset, target: &DataAsset) -> EdgeOutcome {
        fix.graph
            .create_edge(
                &fix.ctx,
                EdgeRequest::new(source.id, target.id, EdgeKind::DerivesFrom),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_self_loop_rejected() {
        let fix = fixture();
        let a = seed_asset(&fix, "a", false).await;
        let err = fix
            .graph
            .create_edge(&fix.ctx, EdgeRequest::new(a.id, a.id, EdgeKind::CopiesTo))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SelfLoop { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_edge_is_idempotent() {
        let fix = fixture();
        let a = seed_asset(&fix, "a", false).await;
        let b = seed_asset(&fix, "b", true).await;
        let first = link(&fix, &a, &b).await;
        assert!(first.created);
        let second = link(&fix, &a, &b).await;
        assert!(!second.created);
        assert_eq!(second.edge.id, first.edge.id);
        assert_eq!(fix.graph.list_edges(&fix.ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_rejected_and_reported() {
        let fix = fixture();
        let a = seed_asset(&fix, "a", false).await;
        let b = seed_asset(&fix, "b", true).await;
        let c = seed_asset(&fix, "c", true).await;
        link(&fix, &a, &b).await;
        link(&fix, &b, &c).await;

        let err = fix
            .graph
            .create_edge(
                &fix.ctx,
                EdgeRequest::new(c.id, a.id, EdgeKind::DerivesFrom),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));

        // No edge committed; a cycle_detected event recorded.
        assert_eq!(fix.graph.list_edges(&fix.ctx).await.unwrap().len(), 2);
        let events = fix
            .stores
            .breaks
            .list(fix.ctx.tenant_id, &BreakFilter::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BreakKind::CycleDetected);
    }

    #[tokio::test]
    async fn test_first_inbound_edge_clears_origin_unknown() {
        let fix = fixture();
        let source = seed_asset(&fix, "s", false).await;
        let x = seed_asset(&fix, "x", true).await;
        link(&fix, &source, &x).await;
        let x = fix
            .stores
            .assets
            .get(fix.ctx.tenant_id, x.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!x.origin_unknown);
    }

    #[tokio::test]
    async fn test_orphan_source_cannot_propagate() {
        let fix = fixture();
        let orphan = seed_asset(&fix, "orphan", true).await;
        let b = seed_asset(&fix, "b", true).await;
        let err = fix
            .graph
            .create_edge(
                &fix.ctx,
                EdgeRequest::new(orphan.id, b.id, EdgeKind::DerivesFrom),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::OrphanPropagationBlocked { .. }));
    }

    #[tokio::test]
    async fn test_deactivating_last_inbound_restores_origin_unknown() {
        let fix = fixture();
        let a = seed_asset(&fix, "a", false).await;
        let b = seed_asset(&fix, "b", true).await;
        let outcome = link(&fix, &a, &b).await;
        fix.graph
            .deactivate_edge(&fix.ctx, outcome.edge.id)
            .await
            .unwrap();
        let b = fix
            .stores
            .assets
            .get(fix.ctx.tenant_id, b.id)
            .await
            .unwrap()
            .unwrap();
        assert!(b.origin_unknown);
    }

    #[tokio::test]
    async fn test_traversal_visits_each_edge_once() {
        let fix = fixture();
        // Diamond: a -> b, a -> c, b -> d, c -> d.
        let a = seed_asset(&fix, "a", false).await;
        let b = seed_asset(&fix, "b", true).await;
        let c = seed_asset(&fix, "c", true).await;
        let d = seed_asset(&fix, "d", true).await;
        link(&fix, &a, &b).await;
        link(&fix, &a, &c).await;
        link(&fix, &b, &d).await;
        link(&fix, &c, &d).await;

        let downstream = fix
            .graph
            .traverse(&fix.ctx, a.id, Direction::Downstream, None)
            .await
            .unwrap();
        assert_eq!(downstream.len(), 4);
        let ids: HashSet<Uuid> = downstream.iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), 4);

        let upstream = fix
            .graph
            .traverse(&fix.ctx, d.id, Direction::Upstream, None)
            .await
            .unwrap();
        assert_eq!(upstream.len(), 4);

        let one_hop = fix
            .graph
            .traverse(&fix.ctx, a.id, Direction::Downstream, Some(1))
            .await
            .unwrap();
        assert_eq!(one_hop.len(), 2);

        // Shared descendants are not cycles; no break events from the walks.
        let events = fix
            .stores
            .breaks
            .list(fix.ctx.tenant_id, &BreakFilter::default())
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_flags_externally_written_cycle() {
        let fix = fixture();
        let a = seed_asset(&fix, "a", false).await;
        let b = seed_asset(&fix, "b", true).await;
        let c = seed_asset(&fix, "c", true).await;
        link(&fix, &a, &b).await;
        link(&fix, &b, &c).await;
        // A cycle c -> b written behind the engine's back.
        let rogue = LineageEdge::new(
            fix.ctx.tenant_id,
            c.id,
            b.id,
            EdgeKind::DerivesFrom,
            fix.ctx.actor_id,
        );
        fix.stores.edges.insert(&rogue).await.unwrap();

        let walked = fix
            .graph
            .traverse(&fix.ctx, a.id, Direction::Downstream, None)
            .await
            .unwrap();
        assert_eq!(walked.len(), 3);

        let events = fix
            .stores
            .breaks
            .list(fix.ctx.tenant_id, &BreakFilter::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == BreakKind::CycleDetected));
    }

    #[tokio::test]
    async fn test_closed_period_blocks_without_override() {
        use crate::models::AuditPeriod;
        let fix = fixture();
        let mut a = seed_asset(&fix, "a", false).await;
        let mut b = seed_asset(&fix, "b", true).await;
        // Backdate both endpoints into last quarter.
        let start = Utc::now() - chrono::Duration::days(60);
        let end = Utc::now() - chrono::Duration::days(30);
        a.created_at = start + chrono::Duration::days(1);
        b.created_at = start + chrono::Duration::days(2);
        fix.stores.assets.update(&a).await.unwrap();
        fix.stores.assets.update(&b).await.unwrap();
        let mut period = AuditPeriod::new(fix.ctx.tenant_id, "Q2", start, end);
        period.close(fix.ctx.actor_id);
        fix.stores.periods.insert(&period).await.unwrap();

        let err = fix
            .graph
            .create_edge(
                &fix.ctx,
                EdgeRequest::new(a.id, b.id, EdgeKind::DerivesFrom),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PeriodClosed { .. }));

        // Admin override with a reason goes through and is audited.
        let mut request = EdgeRequest::new(a.id, b.id, EdgeKind::DerivesFrom);
        request.period_override_reason = Some("restatement".into());
        let outcome = fix.graph.create_edge(&fix.ctx, request).await.unwrap();
        assert!(outcome.created);
        let entries = fix.graph.audit.for_resource(fix.ctx.tenant_id, a.id).await;
        assert!(entries
            .iter()
            .any(|e| e.event_type == AuditEventType::PeriodOverride));
    }

    #[tokio::test]
    async fn test_member_cannot_validate_edge() {
        let fix = fixture();
        let a = seed_asset(&fix, "a", false).await;
        let b = seed_asset(&fix, "b", true).await;
        let outcome = link(&fix, &a, &b).await;
        let member = TenantContext::new(fix.ctx.tenant_id, Uuid::new_v4(), Role::Member);
        assert!(matches!(
            fix.graph.validate_edge(&member, outcome.edge.id).await,
            Err(EngineError::Unauthorized { .. })
        ));
        let edge = fix
            .graph
            .validate_edge(&fix.ctx, outcome.edge.id)
            .await
            .unwrap();
        assert!(edge.validated);
        assert_eq!(edge.validated_by, Some(fix.ctx.actor_id));
    }
}
