//! Break event detection and lifecycle.
//!
//! The detector is the sole writer of `BreakEvent` records. It consumes
//! check failures and graph-validation rejections, classifies them into
//! typed events with deterministic severity, and manages the resolution
//! state machine. Terminal events never reopen; a recurrence creates a new
//! event, preserving history.

use crate::audit::{AuditEntry, AuditEventType, AuditTrail};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::models::{
    BreakEvent, BreakKind, BreakStatus, CheckKind, CheckResult, CheckRun, IntegrityCheck, Severity,
};
use crate::store::{AssetStore, BreakFilter, BreakStore};
use crate::tenant::{Role, TenantContext};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Classifies a failed check run into a break event type.
///
/// Pure dispatch on the check kind, the result, and the evaluator's detail
/// payload: a completeness failure whose target saw no recent inbound data
/// is a `missing_source`; a timeliness failure is a `late_arrival`; accuracy
/// and consistency violations are `data_mismatch`. Evaluator errors with
/// retries exhausted surface as `missing_source` for the arrival-oriented
/// kinds and `data_mismatch` otherwise.
pub fn classify(kind: CheckKind, result: CheckResult, details: &serde_json::Value) -> BreakKind {
    match (kind, result) {
        (CheckKind::Completeness | CheckKind::Timeliness, CheckResult::Error) => {
            BreakKind::MissingSource
        }
        (_, CheckResult::Error) => BreakKind::DataMismatch,
        (CheckKind::Completeness, _) => {
            if details
                .get("no_recent_data")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                BreakKind::MissingSource
            } else {
                BreakKind::DataMismatch
            }
        }
        (CheckKind::Timeliness, _) => BreakKind::LateArrival,
        (CheckKind::Accuracy | CheckKind::Consistency, _) => BreakKind::DataMismatch,
    }
}

/// Detector service over the break store.
pub struct BreakDetector {
    breaks: Arc<dyn BreakStore>,
    assets: Arc<dyn AssetStore>,
    audit: Arc<AuditTrail>,
    bus: EventBus,
    config: EngineConfig,
}

impl BreakDetector {
    pub fn new(
        breaks: Arc<dyn BreakStore>,
        assets: Arc<dyn AssetStore>,
        audit: Arc<AuditTrail>,
        bus: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            breaks,
            assets,
            audit,
            bus,
            config,
        }
    }

    /// Deterministic severity from type and impact magnitude. Cycle and
    /// missing-source default to at least high; an impact amount at or above
    /// the configured threshold escalates one level.
    pub fn severity_for(&self, kind: BreakKind, impact_minor: Option<i64>) -> Severity {
        let base = match kind {
            BreakKind::CycleDetected | BreakKind::MissingSource => Severity::High,
            BreakKind::DataMismatch | BreakKind::LateArrival | BreakKind::OrphanedAsset => {
                Severity::Medium
            }
        };
        match impact_minor {
            Some(amount) if amount >= self.config.impact_escalation_minor => base.escalate(),
            _ => base,
        }
    }

    /// Materializes a break event from a failed check run. Late arrivals
    /// additionally tag the underlying asset `arrived_late`; the data is
    /// still stored and reported separately from on-time data.
    #[instrument(skip(self, ctx, check, run), fields(tenant = %ctx.tenant_id, check = %check.id))]
    pub async fn on_check_failure(
        &self,
        ctx: &TenantContext,
        check: &IntegrityCheck,
        run: &CheckRun,
    ) -> Result<BreakEvent, EngineError> {
        let kind = classify(check.kind, run.result, &run.details);
        let impact_minor = check
            .rule
            .get("impact_minor")
            .and_then(|v| v.as_i64())
            .filter(|&amount| crate::currency::validate_amount_minor(amount));
        let currency = check
            .rule
            .get("currency")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_currency.clone());
        let severity = self.severity_for(kind, impact_minor);

        if kind == BreakKind::LateArrival {
            if let Some(asset_id) = check.asset_id {
                if let Some(mut asset) = self.assets.get(ctx.tenant_id, asset_id).await? {
                    asset.arrived_late = true;
                    asset.updated_at = Utc::now();
                    self.assets.update(&asset).await?;
                }
            }
        }

        let mut event = BreakEvent::new(
            ctx.tenant_id,
            kind,
            severity,
            format!("Check '{}' {}", check.name, run.result),
            ctx.actor_id,
        );
        event.check_id = Some(check.id);
        event.asset_id = check.asset_id;
        event.edge_id = check.edge_id;
        event.description = Some(match impact_minor {
            Some(amount) => format!(
                "{} check returned {} at {}, estimated impact {}",
                check.kind,
                run.result,
                run.finished_at,
                crate::currency::format_amount(amount, &currency),
            ),
            None => format!(
                "{} check returned {} at {}",
                check.kind, run.result, run.finished_at
            ),
        });
        event.details = Some(run.details.clone());
        event.impact_minor = impact_minor;
        event.currency = currency;
        self.emit(ctx, event).await
    }

    /// Records the rejection of an edge that would have closed a cycle. The
    /// edge itself is never committed; this event exists for operator
    /// visibility.
    pub async fn report_cycle(
        &self,
        ctx: &TenantContext,
        source: Uuid,
        target: Uuid,
    ) -> Result<BreakEvent, EngineError> {
        let mut event = BreakEvent::new(
            ctx.tenant_id,
            BreakKind::CycleDetected,
            self.severity_for(BreakKind::CycleDetected, None),
            "Rejected edge would create lineage cycle",
            ctx.actor_id,
        );
        event.asset_id = Some(target);
        event.details = Some(serde_json::json!({
            "source_asset_id": source,
            "target_asset_id": target,
        }));
        self.emit(ctx, event).await
    }

    /// Unconditionally records a closed-period override: who, when, and why.
    /// This is the one write path outside check/graph detection, and it is
    /// never silent.
    pub async fn record_period_override(
        &self,
        ctx: &TenantContext,
        resource_id: Uuid,
        period_name: &str,
        reason: &str,
    ) -> Result<(), EngineError> {
        warn!(
            tenant = %ctx.tenant_id,
            actor = %ctx.actor_id,
            period = period_name,
            "closed-period override"
        );
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::PeriodOverride,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "lineage_edge",
                    resource_id,
                    format!("Override of closed period '{period_name}'"),
                )
                .with_details(serde_json::json!({
                    "severity": Severity::High.as_db_str(),
                    "reason": reason,
                })),
            )
            .await;
        Ok(())
    }

    /// Emits `orphaned_asset` events for assets whose origin has been
    /// unknown past the grace period, measured from `updated_at` so an
    /// asset orphaned late (last inbound edge deactivated) gets the full
    /// grace window. Re-emits only once the prior event is terminal:
    /// orphan sweeps observe a continuing state, unlike discrete check
    /// failures, which are never coalesced.
    pub async fn sweep_orphans(&self, ctx: &TenantContext) -> Result<Vec<BreakEvent>, EngineError> {
        let cutoff = Utc::now() - Duration::minutes(self.config.orphan_grace_minutes);
        let orphans = self
            .assets
            .list(
                ctx.tenant_id,
                &crate::store::AssetFilter {
                    orphans_only: true,
                    ..Default::default()
                },
            )
            .await?;
        let mut emitted = Vec::new();
        for asset in orphans.into_iter().filter(|a| a.updated_at <= cutoff) {
            let open = self.breaks.open_for_asset(ctx.tenant_id, asset.id).await?;
            if open.iter().any(|e| e.kind == BreakKind::OrphanedAsset) {
                continue;
            }
            let mut event = BreakEvent::new(
                ctx.tenant_id,
                BreakKind::OrphanedAsset,
                self.severity_for(BreakKind::OrphanedAsset, None),
                format!("Asset '{}' has unclassified origin", asset.name),
                ctx.actor_id,
            );
            event.asset_id = Some(asset.id);
            event.details = Some(serde_json::json!({
                "orphaned_since": asset.updated_at,
                "grace_minutes": self.config.orphan_grace_minutes,
            }));
            emitted.push(self.emit(ctx, event).await?);
        }
        Ok(emitted)
    }

    /// Transitions a break event's status, validated against the central
    /// transition table. `resolved` requires a resolving actor and non-empty
    /// notes; terminal events reject every further transition.
    #[instrument(skip(self, ctx, notes), fields(tenant = %ctx.tenant_id))]
    pub async fn transition(
        &self,
        ctx: &TenantContext,
        event_id: Uuid,
        to: BreakStatus,
        notes: Option<String>,
    ) -> Result<BreakEvent, EngineError> {
        match to {
            BreakStatus::Resolved | BreakStatus::Dismissed => ctx.require(Role::Admin)?,
            _ => ctx.require(Role::Member)?,
        }
        let mut event = self
            .breaks
            .get(ctx.tenant_id, event_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "break_event",
                id: event_id,
            })?;
        if !event.status.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: event.status,
                to,
            });
        }
        if to == BreakStatus::Resolved
            && notes.as_deref().map(str::trim).unwrap_or("").is_empty()
        {
            return Err(EngineError::MissingResolutionNotes);
        }
        let from = event.status;
        event.status = to;
        if to.is_terminal() {
            event.resolved_at = Some(Utc::now());
            event.resolved_by = Some(ctx.actor_id);
            event.resolution_notes = notes.clone();
        }
        self.breaks.update(&event).await?;
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::BreakStatusChanged,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "break_event",
                    event_id,
                    format!("Break event {from} -> {to}"),
                )
                .with_details(serde_json::json!({"notes": notes})),
            )
            .await;
        Ok(event)
    }

    /// Lists break events, filterable by status and severity.
    pub async fn list(
        &self,
        ctx: &TenantContext,
        filter: &BreakFilter,
    ) -> Result<Vec<BreakEvent>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self.breaks.list(ctx.tenant_id, filter).await?)
    }

    /// Fetches one break event.
    pub async fn get(
        &self,
        ctx: &TenantContext,
        event_id: Uuid,
    ) -> Result<BreakEvent, EngineError> {
        ctx.require(Role::Viewer)?;
        self.breaks
            .get(ctx.tenant_id, event_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "break_event",
                id: event_id,
            })
    }

    async fn emit(
        &self,
        ctx: &TenantContext,
        event: BreakEvent,
    ) -> Result<BreakEvent, EngineError> {
        self.breaks.insert(&event).await?;
        info!(
            tenant = %ctx.tenant_id,
            kind = %event.kind,
            severity = %event.severity,
            "break event detected: {}",
            event.title
        );
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::BreakDetected,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "break_event",
                    event.id,
                    event.title.clone(),
                )
                .with_details(serde_json::json!({
                    "kind": event.kind.as_db_str(),
                    "severity": event.severity.as_db_str(),
                })),
            )
            .await;
        self.bus.publish(EngineEvent::BreakDetected {
            tenant_id: ctx.tenant_id,
            event_id: event.id,
            kind: event.kind,
            severity: event.severity,
        });
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetKind, DataAsset};
    use crate::store::memory::MemoryStores;

    fn detector() -> (BreakDetector, MemoryStores, TenantContext) {
        let stores = MemoryStores::new();
        let detector = BreakDetector::new(
            stores.breaks.clone(),
            stores.assets.clone(),
            Arc::new(AuditTrail::default()),
            EventBus::default(),
            EngineConfig::default(),
        );
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin);
        (detector, stores, ctx)
    }

    #[test]
    fn test_classification_table() {
        let empty = serde_json::json!({});
        let no_data = serde_json::json!({"no_recent_data": true});
        assert_eq!(
            classify(CheckKind::Completeness, CheckResult::Fail, &no_data),
            BreakKind::MissingSource
        );
        assert_eq!(
            classify(CheckKind::Completeness, CheckResult::Fail, &empty),
            BreakKind::DataMismatch
        );
        assert_eq!(
            classify(CheckKind::Timeliness, CheckResult::Fail, &empty),
            BreakKind::LateArrival
        );
        assert_eq!(
            classify(CheckKind::Accuracy, CheckResult::Fail, &empty),
            BreakKind::DataMismatch
        );
        assert_eq!(
            classify(CheckKind::Consistency, CheckResult::Error, &empty),
            BreakKind::DataMismatch
        );
        assert_eq!(
            classify(CheckKind::Timeliness, CheckResult::Error, &empty),
            BreakKind::MissingSource
        );
    }

    #[tokio::test]
    async fn test_severity_escalation_by_impact() {
        let (detector, _, _) = detector();
        assert_eq!(
            detector.severity_for(BreakKind::MissingSource, None),
            Severity::High
        );
        assert_eq!(
            detector.severity_for(BreakKind::MissingSource, Some(2_000_000)),
            Severity::Critical
        );
        assert_eq!(
            detector.severity_for(BreakKind::DataMismatch, Some(10)),
            Severity::Medium
        );
    }

    #[tokio::test]
    async fn test_terminal_event_never_transitions() {
        let (detector, stores, ctx) = detector();
        let ev = BreakEvent::new(
            ctx.tenant_id,
            BreakKind::DataMismatch,
            Severity::Medium,
            "drift",
            ctx.actor_id,
        );
        stores.breaks.insert(&ev).await.unwrap();

        detector
            .transition(&ctx, ev.id, BreakStatus::Resolved, Some("fixed".into()))
            .await
            .unwrap();
        assert!(matches!(
            detector
                .transition(&ctx, ev.id, BreakStatus::Investigating, None)
                .await,
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_requires_notes() {
        let (detector, stores, ctx) = detector();
        let ev = BreakEvent::new(
            ctx.tenant_id,
            BreakKind::LateArrival,
            Severity::Medium,
            "late feed",
            ctx.actor_id,
        );
        stores.breaks.insert(&ev).await.unwrap();
        assert!(matches!(
            detector
                .transition(&ctx, ev.id, BreakStatus::Resolved, Some("  ".into()))
                .await,
            Err(EngineError::MissingResolutionNotes)
        ));
        let resolved = detector
            .transition(&ctx, ev.id, BreakStatus::Resolved, Some("backfilled".into()))
            .await
            .unwrap();
        assert_eq!(resolved.resolved_by, Some(ctx.actor_id));
        assert!(resolved.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_orphan_sweep_grace_and_dedup() {
        let (detector, stores, ctx) = detector();
        // Fresh orphan: inside the grace period, not swept.
        let fresh = DataAsset::new(ctx.tenant_id, "fresh", AssetKind::Table, ctx.actor_id);
        stores.assets.insert(&fresh).await.unwrap();
        // Stale orphan: unclassified since before the cutoff.
        let mut stale = DataAsset::new(ctx.tenant_id, "stale", AssetKind::Table, ctx.actor_id);
        stale.created_at = Utc::now() - Duration::days(3);
        stale.updated_at = stale.created_at;
        stores.assets.insert(&stale).await.unwrap();
        // Orphaned recently: an old asset whose last inbound edge just went
        // away gets the full grace window from that point.
        let mut relapsed = DataAsset::new(ctx.tenant_id, "relapsed", AssetKind::Table, ctx.actor_id);
        relapsed.created_at = Utc::now() - Duration::days(30);
        stores.assets.insert(&relapsed).await.unwrap();

        let first = detector.sweep_orphans(&ctx).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].asset_id, Some(stale.id));

        // Second sweep sees an open event and stays quiet.
        assert!(detector.sweep_orphans(&ctx).await.unwrap().is_empty());

        // Once resolved, a still-unclassified orphan is reported again.
        detector
            .transition(&ctx, first[0].id, BreakStatus::Resolved, Some("noted".into()))
            .await
            .unwrap();
        assert_eq!(detector.sweep_orphans(&ctx).await.unwrap().len(), 1);
    }
}
