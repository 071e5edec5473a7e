//! Integrity check engine: definitions, execution, scheduling.
//!
//! Scheduling is slot-based. A due check's `next_run_at` slot is claimed
//! through the store with a persisted [`RunClaim`] before execution, so a
//! fleet of workers runs each slot at most once; a crashed worker's claim
//! lapses after its TTL and the slot becomes reclaimable. After a run the
//! schedule advances from the slot itself, never from the wall clock, so a
//! delayed run does not drift subsequent slots.

pub mod evaluators;

pub use evaluators::{evaluate, EvaluationOutcome, Observation};

use crate::audit::{AuditEntry, AuditEventType, AuditTrail};
use crate::breaks::BreakDetector;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::models::{CheckKind, CheckResult, CheckRun, IntegrityCheck, RunClaim};
use crate::store::{AssetStore, CheckFilter, CheckStore, EdgeStore};
use crate::tenant::{Role, TenantContext};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Errors surfaced by a data probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Target unreachable: {0}")]
    Unreachable(String),

    #[error("Probe timed out")]
    Timeout,
}

/// Measures a check's target on demand. Implementations wrap whatever
/// connector reaches the underlying source system.
#[async_trait]
pub trait DataProbe: Send + Sync {
    async fn observe(
        &self,
        tenant_id: Uuid,
        check: &IntegrityCheck,
    ) -> Result<Observation, ProbeError>;
}

/// Scripted probe for tests and local development: observations are keyed
/// by check id, with optional leading failures to exercise retries.
#[derive(Default)]
pub struct MockProbe {
    scripts: std::sync::Mutex<std::collections::HashMap<Uuid, Script>>,
}

struct Script {
    observation: Option<Observation>,
    failures_remaining: u32,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the observation returned for `check_id`.
    pub fn set_observation(&self, check_id: Uuid, observation: Observation) {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts
            .entry(check_id)
            .or_insert(Script {
                observation: None,
                failures_remaining: 0,
            })
            .observation = Some(observation);
    }

    /// Makes the next `count` observations for `check_id` fail as
    /// unreachable before the scripted observation is served.
    pub fn fail_next(&self, check_id: Uuid, count: u32) {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts
            .entry(check_id)
            .or_insert(Script {
                observation: None,
                failures_remaining: 0,
            })
            .failures_remaining = count;
    }
}

#[async_trait]
impl DataProbe for MockProbe {
    async fn observe(
        &self,
        _tenant_id: Uuid,
        check: &IntegrityCheck,
    ) -> Result<Observation, ProbeError> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        let Some(script) = scripts.get_mut(&check.id) else {
            return Err(ProbeError::Unreachable("no scripted observation".into()));
        };
        if script.failures_remaining > 0 {
            script.failures_remaining -= 1;
            return Err(ProbeError::Unreachable("scripted failure".into()));
        }
        script
            .observation
            .clone()
            .ok_or_else(|| ProbeError::Unreachable("no scripted observation".into()))
    }
}

/// Request to define a new integrity check.
#[derive(Debug, Clone)]
pub struct NewCheck {
    pub name: String,
    pub kind: CheckKind,
    pub asset_id: Option<Uuid>,
    pub edge_id: Option<Uuid>,
    pub rule: serde_json::Value,
    /// Run interval; `None` means manual-only.
    pub frequency_minutes: Option<i64>,
}

pub struct CheckEngine {
    checks: Arc<dyn CheckStore>,
    assets: Arc<dyn AssetStore>,
    edges: Arc<dyn EdgeStore>,
    probe: Arc<dyn DataProbe>,
    detector: Arc<BreakDetector>,
    audit: Arc<AuditTrail>,
    bus: EventBus,
    config: EngineConfig,
}

impl CheckEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checks: Arc<dyn CheckStore>,
        assets: Arc<dyn AssetStore>,
        edges: Arc<dyn EdgeStore>,
        probe: Arc<dyn DataProbe>,
        detector: Arc<BreakDetector>,
        audit: Arc<AuditTrail>,
        bus: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            checks,
            assets,
            edges,
            probe,
            detector,
            audit,
            bus,
            config,
        }
    }

    /// Defines a check. The target asset or edge must exist; a scheduled
    /// check gets its first slot one interval out.
    #[instrument(skip(self, ctx, request), fields(tenant = %ctx.tenant_id, name = %request.name))]
    pub async fn create_check(
        &self,
        ctx: &TenantContext,
        request: NewCheck,
    ) -> Result<IntegrityCheck, EngineError> {
        ctx.require(Role::Member)?;
        if request.asset_id.is_none() && request.edge_id.is_none() {
            return Err(EngineError::MissingTarget);
        }
        if let Some(asset_id) = request.asset_id {
            self.assets
                .get(ctx.tenant_id, asset_id)
                .await?
                .ok_or(EngineError::MissingTarget)?;
        }
        if let Some(edge_id) = request.edge_id {
            self.edges
                .get(ctx.tenant_id, edge_id)
                .await?
                .ok_or(EngineError::MissingTarget)?;
        }
        if self
            .checks
            .find_by_name(ctx.tenant_id, &request.name)
            .await?
            .is_some()
        {
            return Err(EngineError::DuplicateCheck(request.name));
        }

        let now = Utc::now();
        let check = IntegrityCheck {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            asset_id: request.asset_id,
            edge_id: request.edge_id,
            name: request.name,
            kind: request.kind,
            rule: request.rule,
            frequency_minutes: request.frequency_minutes,
            last_run_at: None,
            next_run_at: request
                .frequency_minutes
                .map(|m| now + ChronoDuration::minutes(m)),
            last_result: None,
            last_result_details: None,
            claim: None,
            active: true,
            created_by: ctx.actor_id,
            created_at: now,
            updated_at: now,
        };
        self.checks.insert(&check).await?;
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::CheckCreated,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "integrity_check",
                    check.id,
                    format!("Check '{}' ({}) created", check.name, check.kind),
                )
                .with_details(serde_json::json!({
                    "kind": check.kind.as_db_str(),
                    "frequency_minutes": check.frequency_minutes,
                })),
            )
            .await;
        Ok(check)
    }

    /// Runs one check immediately. Manual runs bypass the claim protocol
    /// and do not touch the schedule.
    pub async fn run_check(
        &self,
        ctx: &TenantContext,
        check_id: Uuid,
    ) -> Result<CheckRun, EngineError> {
        ctx.require(Role::Member)?;
        let mut check = self
            .checks
            .get(ctx.tenant_id, check_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "integrity_check",
                id: check_id,
            })?;
        if !check.active {
            return Err(EngineError::CheckExecution(format!(
                "check '{}' is deactivated",
                check.name
            )));
        }
        let run = self.execute(ctx, &mut check, None).await?;
        self.checks.update(&check).await?;
        Ok(run)
    }

    /// Claims and executes every check whose slot has arrived. Returns the
    /// runs this worker actually performed; slots held by live claims of
    /// other workers are skipped.
    #[instrument(skip(self, ctx), fields(tenant = %ctx.tenant_id))]
    pub async fn run_due(
        &self,
        ctx: &TenantContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<CheckRun>, EngineError> {
        ctx.require(Role::Member)?;
        let due = self.checks.due(ctx.tenant_id, now).await?;
        let mut runs = Vec::with_capacity(due.len());
        for mut check in due {
            let Some(slot) = check.next_run_at else {
                continue;
            };
            let claim = RunClaim::new(slot, self.config.claim_ttl_secs);
            let token = claim.owner_token;
            if !self.checks.claim(ctx.tenant_id, check.id, &claim).await? {
                debug!(check = %check.id, "slot already claimed; skipping");
                continue;
            }
            let run = self.execute(ctx, &mut check, Some(slot)).await?;
            check.advance_schedule(slot);
            check.claim = None;
            self.checks.update(&check).await?;
            self.checks.release(ctx.tenant_id, check.id, token).await?;
            runs.push(run);
        }
        Ok(runs)
    }

    /// Lists checks, optionally filtered.
    pub async fn list(
        &self,
        ctx: &TenantContext,
        filter: &CheckFilter,
    ) -> Result<Vec<IntegrityCheck>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self.checks.list(ctx.tenant_id, filter).await?)
    }

    /// Probes, evaluates, records the run, and hands failures to the
    /// detector. Probe errors are retried with exponential backoff; if all
    /// attempts fail the run is recorded as `error`.
    async fn execute(
        &self,
        ctx: &TenantContext,
        check: &mut IntegrityCheck,
        slot: Option<DateTime<Utc>>,
    ) -> Result<CheckRun, EngineError> {
        let started_at = Utc::now();
        let outcome = match self.probe_with_retry(ctx.tenant_id, check).await {
            Ok(observation) => evaluate(check.kind, &check.rule, &observation, Utc::now()),
            Err(err) => {
                warn!(check = %check.id, error = %err, "probe failed after retries");
                EvaluationOutcome {
                    result: CheckResult::Error,
                    details: serde_json::json!({"error": err.to_string()}),
                }
            }
        };

        let run = CheckRun {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant_id,
            check_id: check.id,
            asset_id: check.asset_id,
            kind: check.kind,
            slot,
            result: outcome.result,
            details: outcome.details,
            started_at,
            finished_at: Utc::now(),
        };
        self.checks.record_run(&run).await?;

        check.last_run_at = Some(run.finished_at);
        check.last_result = Some(run.result);
        check.last_result_details = Some(run.details.clone());
        check.updated_at = Utc::now();

        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::CheckCompleted,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "integrity_check",
                    check.id,
                    format!("Check '{}' completed: {}", check.name, run.result),
                )
                .with_details(run.details.clone()),
            )
            .await;
        self.bus.publish(EngineEvent::CheckCompleted {
            tenant_id: ctx.tenant_id,
            check_id: check.id,
            result: run.result,
        });

        if run.result.is_failure() {
            self.detector.on_check_failure(ctx, check, &run).await?;
        }
        Ok(run)
    }

    async fn probe_with_retry(
        &self,
        tenant_id: Uuid,
        check: &IntegrityCheck,
    ) -> Result<Observation, ProbeError> {
        let policy = &self.config.check_retry;
        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(timeout, self.probe.observe(tenant_id, check))
                .await
                .map_err(|_| ProbeError::Timeout)
                .and_then(|r| r);
            match result {
                Ok(observation) => return Ok(observation),
                Err(err) => {
                    attempt += 1;
                    if attempt >= policy.max_attempts {
                        return Err(err);
                    }
                    debug!(check = %check.id, attempt, error = %err, "probe attempt failed");
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::models::{AssetKind, BreakKind, DataAsset};
    use crate::store::memory::MemoryStores;
    use crate::store::{BreakFilter, BreakStore};

    struct Fixture {
        engine: CheckEngine,
        stores: MemoryStores,
        probe: Arc<MockProbe>,
        ctx: TenantContext,
        asset: DataAsset,
    }

    async fn fixture() -> Fixture {
        let stores = MemoryStores::new();
        let audit = Arc::new(AuditTrail::default());
        let bus = EventBus::default();
        let probe = Arc::new(MockProbe::new());
        let config = EngineConfig {
            check_retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                backoff_multiplier: 2.0,
            },
            ..Default::default()
        };
        let detector = Arc::new(BreakDetector::new(
            stores.breaks.clone(),
            stores.assets.clone(),
            audit.clone(),
            bus.clone(),
            config.clone(),
        ));
        let engine = CheckEngine::new(
            stores.checks.clone(),
            stores.assets.clone(),
            stores.edges.clone(),
            probe.clone(),
            detector,
            audit,
            bus,
            config,
        );
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin);
        let asset = DataAsset::new(ctx.tenant_id, "orders", AssetKind::Table, ctx.actor_id);
        stores.assets.insert(&asset).await.unwrap();
        Fixture {
            engine,
            stores,
            probe,
            ctx,
            asset,
        }
    }

    fn completeness(fix: &Fixture, name: &str, freq: Option<i64>) -> NewCheck {
        NewCheck {
            name: name.into(),
            kind: CheckKind::Completeness,
            asset_id: Some(fix.asset.id),
            edge_id: None,
            rule: serde_json::json!({"min_row_count": 10}),
            frequency_minutes: freq,
        }
    }

    #[tokio::test]
    async fn test_create_requires_target() {
        let fix = fixture().await;
        let mut request = completeness(&fix, "untargeted", None);
        request.asset_id = None;
        assert!(matches!(
            fix.engine.create_check(&fix.ctx, request).await,
            Err(EngineError::MissingTarget)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let fix = fixture().await;
        fix.engine
            .create_check(&fix.ctx, completeness(&fix, "orders-complete", None))
            .await
            .unwrap();
        assert!(matches!(
            fix.engine
                .create_check(&fix.ctx, completeness(&fix, "orders-complete", None))
                .await,
            Err(EngineError::DuplicateCheck(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_run_records_history() {
        let fix = fixture().await;
        let check = fix
            .engine
            .create_check(&fix.ctx, completeness(&fix, "orders-complete", None))
            .await
            .unwrap();
        fix.probe.set_observation(
            check.id,
            Observation {
                row_count: Some(100),
                ..Default::default()
            },
        );
        let run = fix.engine.run_check(&fix.ctx, check.id).await.unwrap();
        assert_eq!(run.result, CheckResult::Pass);
        assert_eq!(run.slot, None);
        let stored = fix
            .stores
            .checks
            .get(fix.ctx.tenant_id, check.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_result, Some(CheckResult::Pass));
        // Manual runs never advance the (absent) schedule.
        assert_eq!(stored.next_run_at, None);
    }

    #[tokio::test]
    async fn test_failure_emits_break_event() {
        let fix = fixture().await;
        let check = fix
            .engine
            .create_check(&fix.ctx, completeness(&fix, "orders-complete", None))
            .await
            .unwrap();
        fix.probe.set_observation(
            check.id,
            Observation {
                row_count: Some(0),
                ..Default::default()
            },
        );
        let run = fix.engine.run_check(&fix.ctx, check.id).await.unwrap();
        assert_eq!(run.result, CheckResult::Fail);
        let events = fix
            .stores
            .breaks
            .list(fix.ctx.tenant_id, &BreakFilter::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BreakKind::MissingSource);
        assert_eq!(events[0].asset_id, Some(fix.asset.id));
    }

    #[tokio::test]
    async fn test_probe_retry_then_success() {
        let fix = fixture().await;
        let check = fix
            .engine
            .create_check(&fix.ctx, completeness(&fix, "flaky", None))
            .await
            .unwrap();
        fix.probe.set_observation(
            check.id,
            Observation {
                row_count: Some(50),
                ..Default::default()
            },
        );
        fix.probe.fail_next(check.id, 2);
        let run = fix.engine.run_check(&fix.ctx, check.id).await.unwrap();
        assert_eq!(run.result, CheckResult::Pass);
    }

    #[tokio::test]
    async fn test_exhausted_retries_record_error() {
        let fix = fixture().await;
        let check = fix
            .engine
            .create_check(&fix.ctx, completeness(&fix, "down", None))
            .await
            .unwrap();
        // No scripted observation at all: every attempt is unreachable.
        let run = fix.engine.run_check(&fix.ctx, check.id).await.unwrap();
        assert_eq!(run.result, CheckResult::Error);
        let events = fix
            .stores
            .breaks
            .list(fix.ctx.tenant_id, &BreakFilter::default())
            .await
            .unwrap();
        assert_eq!(events[0].kind, BreakKind::MissingSource);
    }

    #[tokio::test]
    async fn test_run_due_advances_slot_not_wall_clock() {
        let fix = fixture().await;
        let check = fix
            .engine
            .create_check(&fix.ctx, completeness(&fix, "hourly", Some(60)))
            .await
            .unwrap();
        fix.probe.set_observation(
            check.id,
            Observation {
                row_count: Some(100),
                ..Default::default()
            },
        );
        // Backdate the slot as if the worker woke up late.
        let slot = Utc::now() - ChronoDuration::minutes(45);
        let mut stored = fix
            .stores
            .checks
            .get(fix.ctx.tenant_id, check.id)
            .await
            .unwrap()
            .unwrap();
        stored.next_run_at = Some(slot);
        fix.stores.checks.update(&stored).await.unwrap();

        let runs = fix.engine.run_due(&fix.ctx, Utc::now()).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].slot, Some(slot));

        let after = fix
            .stores
            .checks
            .get(fix.ctx.tenant_id, check.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.next_run_at, Some(slot + ChronoDuration::minutes(60)));
        assert!(after.claim.is_none());
    }

    #[tokio::test]
    async fn test_claimed_slot_skipped_by_second_worker() {
        let fix = fixture().await;
        let check = fix
            .engine
            .create_check(&fix.ctx, completeness(&fix, "hourly", Some(60)))
            .await
            .unwrap();
        let slot = Utc::now() - ChronoDuration::minutes(5);
        let mut stored = fix
            .stores
            .checks
            .get(fix.ctx.tenant_id, check.id)
            .await
            .unwrap()
            .unwrap();
        stored.next_run_at = Some(slot);
        fix.stores.checks.update(&stored).await.unwrap();

        // Another worker holds a live claim for the same slot.
        let foreign = RunClaim::new(slot, 300);
        assert!(fix
            .stores
            .checks
            .claim(fix.ctx.tenant_id, check.id, &foreign)
            .await
            .unwrap());
        let runs = fix.engine.run_due(&fix.ctx, Utc::now()).await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn test_expired_claim_is_reclaimable() {
        let fix = fixture().await;
        let check = fix
            .engine
            .create_check(&fix.ctx, completeness(&fix, "hourly", Some(60)))
            .await
            .unwrap();
        fix.probe.set_observation(
            check.id,
            Observation {
                row_count: Some(100),
                ..Default::default()
            },
        );
        let slot = Utc::now() - ChronoDuration::minutes(5);
        let mut stored = fix
            .stores
            .checks
            .get(fix.ctx.tenant_id, check.id)
            .await
            .unwrap()
            .unwrap();
        stored.next_run_at = Some(slot);
        // A dead worker's claim, already lapsed.
        let mut dead = RunClaim::new(slot, 300);
        dead.expires_at = Utc::now() - ChronoDuration::seconds(1);
        stored.claim = Some(dead);
        fix.stores.checks.update(&stored).await.unwrap();

        let runs = fix.engine.run_due(&fix.ctx, Utc::now()).await.unwrap();
        assert_eq!(runs.len(), 1);
    }
}
