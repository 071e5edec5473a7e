//! Risk scoring engine.
//!
//! Sole writer of `RiskScore` snapshots. A recomputation reads the asset's
//! check-run history over the lookback window and its currently-open break
//! events, combines per-kind pass rates into a weighted overall score,
//! subtracts a penalty per open break, clamps to [0, 100], and appends a
//! new snapshot. Prior snapshots are never touched.

use crate::audit::{AuditEntry, AuditEventType, AuditTrail};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::models::{CheckKind, CheckRun, RiskScore};
use crate::store::{BreakStore, CheckStore, RiskStore};
use crate::tenant::{Role, TenantContext};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct RiskEngine {
    scores: Arc<dyn RiskStore>,
    breaks: Arc<dyn BreakStore>,
    checks: Arc<dyn CheckStore>,
    audit: Arc<AuditTrail>,
    bus: EventBus,
    config: EngineConfig,
}

/// Pass rate over one component's runs in the lookback window, as a score
/// in [0, 100]. Warnings count toward the pass rate; only `fail` and
/// `error` count against it.
fn component_score(runs: &[&CheckRun]) -> Option<u8> {
    if runs.is_empty() {
        return None;
    }
    let passed = runs.iter().filter(|r| !r.result.is_failure()).count();
    Some(((passed as f64 / runs.len() as f64) * 100.0).round() as u8)
}

impl RiskEngine {
    pub fn new(
        scores: Arc<dyn RiskStore>,
        breaks: Arc<dyn BreakStore>,
        checks: Arc<dyn CheckStore>,
        audit: Arc<AuditTrail>,
        bus: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            scores,
            breaks,
            checks,
            audit,
            bus,
            config,
        }
    }

    /// Recomputes an asset's risk score and appends the snapshot.
    ///
    /// Weights are renormalized over the components that actually have
    /// history; an asset with no runs at all starts from a base of 100 and
    /// is shaped only by open-break penalties. Consistency runs fold into
    /// the accuracy component.
    #[instrument(skip(self, ctx), fields(tenant = %ctx.tenant_id, asset = %asset_id))]
    pub async fn recompute(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<RiskScore, EngineError> {
        ctx.require(Role::Member)?;
        let now = Utc::now();
        let since = now - Duration::minutes(self.config.lookback_minutes);
        let runs = self
            .checks
            .runs_for_asset(ctx.tenant_id, asset_id, since)
            .await?;

        let of_kind = |kinds: &[CheckKind]| -> Vec<&CheckRun> {
            runs.iter().filter(|r| kinds.contains(&r.kind)).collect()
        };
        let completeness = component_score(&of_kind(&[CheckKind::Completeness]));
        let timeliness = component_score(&of_kind(&[CheckKind::Timeliness]));
        let accuracy = component_score(&of_kind(&[CheckKind::Accuracy, CheckKind::Consistency]));

        let weights = &self.config.weights;
        let weighted: Vec<(f64, u8)> = [
            (weights.completeness, completeness),
            (weights.timeliness, timeliness),
            (weights.accuracy, accuracy),
        ]
        .into_iter()
        .filter_map(|(w, s)| s.map(|s| (w, s)))
        .collect();
        let weight_total: f64 = weighted.iter().map(|(w, _)| w).sum();
        let base = if weight_total > 0.0 {
            weighted
                .iter()
                .map(|(w, s)| w / weight_total * *s as f64)
                .sum()
        } else {
            100.0
        };

        let open = self.breaks.open_for_asset(ctx.tenant_id, asset_id).await?;
        let penalty: f64 = open
            .iter()
            .map(|e| self.config.penalties.for_severity(e.severity))
            .sum();
        // Minor units are only additive within one currency; amounts in any
        // other currency are left out of the sum.
        let exposure: i64 = open
            .iter()
            .filter(|e| e.currency == self.config.default_currency)
            .filter_map(|e| e.impact_minor)
            .sum();
        let overall = (base - penalty).clamp(0.0, 100.0).round() as u8;

        let previous = self.scores.latest(ctx.tenant_id, asset_id).await?;
        let previous_score = previous.map(|p| p.overall_score);
        let score_change = previous_score
            .map(|p| overall as i16 - p as i16)
            .unwrap_or(0);

        let snapshot = RiskScore {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            asset_id,
            overall_score: overall,
            completeness_score: completeness,
            timeliness_score: timeliness,
            accuracy_score: accuracy,
            factors: serde_json::json!({
                "base_score": base,
                "open_break_count": open.len(),
                "break_penalty": penalty,
                "lookback_runs": runs.len(),
            }),
            previous_score,
            score_change,
            exposure_minor: (exposure > 0).then_some(exposure),
            currency: self.config.default_currency.clone(),
            computed_at: now,
            valid_until: Some(now + Duration::hours(self.config.score_valid_hours)),
        };
        self.scores.append(&snapshot).await?;

        info!(score = overall, change = score_change, "risk score computed");
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::ScoreComputed,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "risk_score",
                    snapshot.id,
                    format!("Risk score {overall} for asset {asset_id}"),
                )
                .with_details(snapshot.factors.clone()),
            )
            .await;
        self.bus.publish(EngineEvent::ScoreComputed {
            tenant_id: ctx.tenant_id,
            asset_id,
            overall_score: overall,
        });
        Ok(snapshot)
    }

    /// The asset's current (latest) snapshot, if one exists.
    pub async fn current(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<Option<RiskScore>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self.scores.latest(ctx.tenant_id, asset_id).await?)
    }

    /// Full snapshot history for one asset, newest first.
    pub async fn history(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<Vec<RiskScore>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self.scores.history(ctx.tenant_id, asset_id).await?)
    }

    /// Latest snapshot per asset scoring at or above `min_score`.
    pub async fn above_threshold(
        &self,
        ctx: &TenantContext,
        min_score: u8,
    ) -> Result<Vec<RiskScore>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self
            .scores
            .latest_per_asset(ctx.tenant_id, min_score)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BreakEvent, BreakKind, CheckResult, Severity};
    use crate::store::memory::MemoryStores;
    use crate::tenant::Role;

    struct Fixture {
        engine: RiskEngine,
        stores: MemoryStores,
        ctx: TenantContext,
    }

    fn fixture() -> Fixture {
        let stores = MemoryStores::new();
        let engine = RiskEngine::new(
            stores.risks.clone(),
            stores.breaks.clone(),
            stores.checks.clone(),
            Arc::new(AuditTrail::default()),
            EventBus::default(),
            EngineConfig::default(),
        );
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Member);
        Fixture {
            engine,
            stores,
            ctx,
        }
    }

    async fn record_run(fix: &Fixture, asset_id: Uuid, kind: CheckKind, result: CheckResult) {
        let now = Utc::now();
        let run = CheckRun {
            id: Uuid::new_v4(),
            tenant_id: fix.ctx.tenant_id,
            check_id: Uuid::new_v4(),
            asset_id: Some(asset_id),
            kind,
            slot: None,
            result,
            details: serde_json::json!({}),
            started_at: now,
            finished_at: now,
        };
        fix.stores.checks.record_run(&run).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_history_no_breaks_scores_100() {
        let fix = fixture();
        let asset_id = Uuid::new_v4();
        let snapshot = fix.engine.recompute(&fix.ctx, asset_id).await.unwrap();
        assert_eq!(snapshot.overall_score, 100);
        assert_eq!(snapshot.completeness_score, None);
        assert_eq!(snapshot.score_change, 0);
        assert_eq!(snapshot.previous_score, None);
    }

    #[tokio::test]
    async fn test_pass_rate_components_and_renormalized_weights() {
        let fix = fixture();
        let asset_id = Uuid::new_v4();
        // Completeness: 3 of 4 pass (warning counts as pass). No other kinds.
        record_run(&fix, asset_id, CheckKind::Completeness, CheckResult::Pass).await;
        record_run(&fix, asset_id, CheckKind::Completeness, CheckResult::Pass).await;
        record_run(&fix, asset_id, CheckKind::Completeness, CheckResult::Warning).await;
        record_run(&fix, asset_id, CheckKind::Completeness, CheckResult::Fail).await;

        let snapshot = fix.engine.recompute(&fix.ctx, asset_id).await.unwrap();
        assert_eq!(snapshot.completeness_score, Some(75));
        assert_eq!(snapshot.timeliness_score, None);
        // Sole present component carries full weight.
        assert_eq!(snapshot.overall_score, 75);
    }

    #[tokio::test]
    async fn test_consistency_folds_into_accuracy() {
        let fix = fixture();
        let asset_id = Uuid::new_v4();
        record_run(&fix, asset_id, CheckKind::Accuracy, CheckResult::Pass).await;
        record_run(&fix, asset_id, CheckKind::Consistency, CheckResult::Fail).await;
        let snapshot = fix.engine.recompute(&fix.ctx, asset_id).await.unwrap();
        assert_eq!(snapshot.accuracy_score, Some(50));
    }

    #[tokio::test]
    async fn test_open_critical_break_lowers_score() {
        let fix = fixture();
        let clean = Uuid::new_v4();
        let broken = Uuid::new_v4();
        for asset_id in [clean, broken] {
            record_run(&fix, asset_id, CheckKind::Completeness, CheckResult::Pass).await;
        }
        let mut event = BreakEvent::new(
            fix.ctx.tenant_id,
            BreakKind::DataMismatch,
            Severity::Critical,
            "ledger drift",
            fix.ctx.actor_id,
        );
        event.asset_id = Some(broken);
        event.impact_minor = Some(5_000_000);
        fix.stores.breaks.insert(&event).await.unwrap();

        // Impact in a foreign currency never lands in the exposure sum.
        let mut foreign = BreakEvent::new(
            fix.ctx.tenant_id,
            BreakKind::DataMismatch,
            Severity::Low,
            "fx ledger drift",
            fix.ctx.actor_id,
        );
        foreign.asset_id = Some(broken);
        foreign.impact_minor = Some(9_000_000);
        foreign.currency = "USD".to_string();
        fix.stores.breaks.insert(&foreign).await.unwrap();

        let clean_score = fix.engine.recompute(&fix.ctx, clean).await.unwrap();
        let broken_score = fix.engine.recompute(&fix.ctx, broken).await.unwrap();
        assert_eq!(clean_score.overall_score, 100);
        assert_eq!(broken_score.overall_score, 73);
        assert_eq!(broken_score.exposure_minor, Some(5_000_000));
    }

    #[tokio::test]
    async fn test_score_change_delta_law() {
        let fix = fixture();
        let asset_id = Uuid::new_v4();
        let first = fix.engine.recompute(&fix.ctx, asset_id).await.unwrap();
        assert_eq!(first.score_change, 0);

        record_run(&fix, asset_id, CheckKind::Timeliness, CheckResult::Fail).await;
        let second = fix.engine.recompute(&fix.ctx, asset_id).await.unwrap();
        assert_eq!(second.previous_score, Some(first.overall_score));
        assert_eq!(
            second.score_change,
            second.overall_score as i16 - first.overall_score as i16
        );

        // History is append-only: both snapshots survive, newest first.
        let history = fix.engine.history(&fix.ctx, asset_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
    }

    #[tokio::test]
    async fn test_score_clamped_at_zero() {
        let fix = fixture();
        let asset_id = Uuid::new_v4();
        record_run(&fix, asset_id, CheckKind::Completeness, CheckResult::Fail).await;
        for _ in 0..6 {
            let mut event = BreakEvent::new(
                fix.ctx.tenant_id,
                BreakKind::MissingSource,
                Severity::Critical,
                "feed down",
                fix.ctx.actor_id,
            );
            event.asset_id = Some(asset_id);
            fix.stores.breaks.insert(&event).await.unwrap();
        }
        let snapshot = fix.engine.recompute(&fix.ctx, asset_id).await.unwrap();
        assert_eq!(snapshot.overall_score, 0);
    }

    #[tokio::test]
    async fn test_threshold_listing() {
        let fix = fixture();
        let healthy = Uuid::new_v4();
        let risky = Uuid::new_v4();
        record_run(&fix, healthy, CheckKind::Completeness, CheckResult::Pass).await;
        record_run(&fix, risky, CheckKind::Completeness, CheckResult::Fail).await;
        fix.engine.recompute(&fix.ctx, healthy).await.unwrap();
        fix.engine.recompute(&fix.ctx, risky).await.unwrap();

        let above = fix.engine.above_threshold(&fix.ctx, 90).await.unwrap();
        assert_eq!(above.len(), 1);
        assert_eq!(above[0].asset_id, healthy);
    }
}
