//! SQLite-backed stores via `sqlx`.
//!
//! Each table carries scalar columns for the fields queries filter and sort
//! on, plus a `data` column holding the full serialized record; reads
//! deserialize `data` so the row layout never drifts from the model. Run
//! claims live in dedicated columns so the claim handshake is a single
//! conditional UPDATE.
//!
//! Timestamps are stored as RFC 3339 text; UTC-normalized values of this
//! format compare correctly as strings.

use super::{
    AssetFilter, AssetStore, BreakFilter, BreakStore, CheckFilter, CheckStore, EdgeStore,
    PeriodStore, RiskStore, SourceStore, StoreError,
};
use crate::models::{
    AuditPeriod, BreakEvent, CheckRun, DataAsset, DataSource, EdgeKind, IntegrityCheck,
    LineageEdge, RiskScore, RunClaim,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const CREATE_TABLES: &str = r#"
    CREATE TABLE IF NOT EXISTS data_sources (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        active INTEGER NOT NULL,
        data TEXT NOT NULL,
        UNIQUE (tenant_id, name)
    );

    CREATE TABLE IF NOT EXISTS data_assets (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        version INTEGER NOT NULL,
        source_id TEXT,
        origin_unknown INTEGER NOT NULL,
        active INTEGER NOT NULL,
        data TEXT NOT NULL,
        UNIQUE (tenant_id, name, version)
    );
    CREATE INDEX IF NOT EXISTS idx_assets_tenant ON data_assets(tenant_id);

    CREATE TABLE IF NOT EXISTS lineage_edges (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        source_asset_id TEXT NOT NULL,
        target_asset_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        active INTEGER NOT NULL,
        data TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_edges_active_unique
        ON lineage_edges(tenant_id, source_asset_id, target_asset_id, kind)
        WHERE active = 1;
    CREATE INDEX IF NOT EXISTS idx_edges_target ON lineage_edges(tenant_id, target_asset_id);

    CREATE TABLE IF NOT EXISTS integrity_checks (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        name TEXT NOT NULL,
        next_run_at TEXT,
        active INTEGER NOT NULL,
        claim_token TEXT,
        claim_slot TEXT,
        claim_expires TEXT,
        data TEXT NOT NULL,
        UNIQUE (tenant_id, name)
    );

    CREATE TABLE IF NOT EXISTS check_runs (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        check_id TEXT NOT NULL,
        asset_id TEXT,
        finished_at TEXT NOT NULL,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_runs_asset ON check_runs(tenant_id, asset_id, finished_at);

    CREATE TABLE IF NOT EXISTS break_events (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        asset_id TEXT,
        status TEXT NOT NULL,
        severity TEXT NOT NULL,
        detected_at TEXT NOT NULL,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_breaks_asset ON break_events(tenant_id, asset_id, status);

    CREATE TABLE IF NOT EXISTS risk_scores (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        asset_id TEXT NOT NULL,
        overall_score INTEGER NOT NULL,
        computed_at TEXT NOT NULL,
        data TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_scores_asset ON risk_scores(tenant_id, asset_id, computed_at);

    CREATE TABLE IF NOT EXISTS audit_periods (
        id TEXT PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        starts_at TEXT NOT NULL,
        ends_at TEXT NOT NULL,
        status TEXT NOT NULL,
        data TEXT NOT NULL
    );
"#;

/// Creates the schema if it does not exist.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    info!("Running SQLite migrations");
    for statement in CREATE_TABLES.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(data: &str) -> Result<T, StoreError> {
    serde_json::from_str(data).map_err(StoreError::from)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(StoreError::from)
}

/// SQLite-backed store bundle, mirroring [`MemoryStores`](super::MemoryStores).
#[derive(Clone)]
pub struct SqliteStores {
    pub sources: Arc<SqliteSourceStore>,
    pub assets: Arc<SqliteAssetStore>,
    pub edges: Arc<SqliteEdgeStore>,
    pub checks: Arc<SqliteCheckStore>,
    pub breaks: Arc<SqliteBreakStore>,
    pub risks: Arc<SqliteRiskStore>,
    pub periods: Arc<SqlitePeriodStore>,
}

impl SqliteStores {
    /// Connects to `url` and prepares the schema. Use `sqlite::memory:` for
    /// an ephemeral database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            sources: Arc::new(SqliteSourceStore { pool: pool.clone() }),
            assets: Arc::new(SqliteAssetStore { pool: pool.clone() }),
            edges: Arc::new(SqliteEdgeStore { pool: pool.clone() }),
            checks: Arc::new(SqliteCheckStore { pool: pool.clone() }),
            breaks: Arc::new(SqliteBreakStore { pool: pool.clone() }),
            risks: Arc::new(SqliteRiskStore { pool: pool.clone() }),
            periods: Arc::new(SqlitePeriodStore { pool }),
        }
    }
}

impl From<SqliteStores> for crate::engine::EngineStores {
    fn from(stores: SqliteStores) -> Self {
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

pub struct SqliteSourceStore {
    pool: SqlitePool,
}

#[async_trait]
impl SourceStore for SqliteSourceStore {
    async fn insert(&self, source: &DataSource) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO data_sources (id, tenant_id, name, active, data) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(source.id.to_string())
        .bind(source.tenant_id.to_string())
        .bind(&source.name)
        .bind(source.active)
        .bind(encode(source)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DataSource>, StoreError> {
        let row = sqlx::query("SELECT data FROM data_sources WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn find_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<DataSource>, StoreError> {
        let row = sqlx::query("SELECT data FROM data_sources WHERE tenant_id = ? AND name = ?")
            .bind(tenant_id.to_string())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<DataSource>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM data_sources WHERE tenant_id = ? AND (active = 1 OR ? = 0) ORDER BY name",
        )
        .bind(tenant_id.to_string())
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn update(&self, source: &DataSource) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE data_sources SET name = ?, active = ?, data = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(&source.name)
        .bind(source.active)
        .bind(encode(source)?)
        .bind(source.tenant_id.to_string())
        .bind(source.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "data_source".to_string(),
                id: source.id.to_string(),
            });
        }
        Ok(())
    }
}

pub struct SqliteAssetStore {
    pool: SqlitePool,
}

#[async_trait]
impl AssetStore for SqliteAssetStore {
    async fn insert(&self, asset: &DataAsset) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO data_assets (id, tenant_id, name, version, source_id, origin_unknown, active, data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(asset.id.to_string())
        .bind(asset.tenant_id.to_string())
        .bind(&asset.name)
        .bind(asset.version)
        .bind(asset.source_id.map(|id| id.to_string()))
        .bind(asset.origin_unknown)
        .bind(asset.active)
        .bind(encode(asset)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<DataAsset>, StoreError> {
        let row = sqlx::query("SELECT data FROM data_assets WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &AssetFilter,
    ) -> Result<Vec<DataAsset>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM data_assets
            WHERE tenant_id = ?
              AND (? IS NULL OR source_id = ?)
              AND (origin_unknown = 1 OR ? = 0)
              AND (active = 1 OR ? = 1)
            ORDER BY name, version
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(filter.source_id.map(|id| id.to_string()))
        .bind(filter.source_id.map(|id| id.to_string()))
        .bind(filter.orphans_only)
        .bind(filter.include_inactive)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn max_version(&self, tenant_id: Uuid, name: &str) -> Result<Option<i64>, StoreError> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM data_assets WHERE tenant_id = ? AND name = ?",
        )
        .bind(tenant_id.to_string())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(version)
    }

    async fn update(&self, asset: &DataAsset) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE data_assets
            SET source_id = ?, origin_unknown = ?, active = ?, data = ?
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(asset.source_id.map(|id| id.to_string()))
        .bind(asset.origin_unknown)
        .bind(asset.active)
        .bind(encode(asset)?)
        .bind(asset.tenant_id.to_string())
        .bind(asset.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "data_asset".to_string(),
                id: asset.id.to_string(),
            });
        }
        Ok(())
    }
}

pub struct SqliteEdgeStore {
    pool: SqlitePool,
}

#[async_trait]
impl EdgeStore for SqliteEdgeStore {
    async fn insert(&self, edge: &LineageEdge) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO lineage_edges (id, tenant_id, source_asset_id, target_asset_id, kind, active, data)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(edge.id.to_string())
        .bind(edge.tenant_id.to_string())
        .bind(edge.source_asset_id.to_string())
        .bind(edge.target_asset_id.to_string())
        .bind(edge.kind.as_db_str())
        .bind(edge.active)
        .bind(encode(edge)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<LineageEdge>, StoreError> {
        let row = sqlx::query("SELECT data FROM lineage_edges WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn find_active(
        &self,
        tenant_id: Uuid,
        source: Uuid,
        target: Uuid,
        kind: EdgeKind,
    ) -> Result<Option<LineageEdge>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT data FROM lineage_edges
            WHERE tenant_id = ? AND source_asset_id = ? AND target_asset_id = ?
              AND kind = ? AND active = 1
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(source.to_string())
        .bind(target.to_string())
        .bind(kind.as_db_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn list_active(&self, tenant_id: Uuid) -> Result<Vec<LineageEdge>, StoreError> {
        let rows = sqlx::query("SELECT data FROM lineage_edges WHERE tenant_id = ? AND active = 1")
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn inbound(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<LineageEdge>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM lineage_edges WHERE tenant_id = ? AND target_asset_id = ? AND active = 1",
        )
        .bind(tenant_id.to_string())
        .bind(asset_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn outbound(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<LineageEdge>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM lineage_edges WHERE tenant_id = ? AND source_asset_id = ? AND active = 1",
        )
        .bind(tenant_id.to_string())
        .bind(asset_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn update(&self, edge: &LineageEdge) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE lineage_edges SET active = ?, data = ? WHERE tenant_id = ? AND id = ?")
                .bind(edge.active)
                .bind(encode(edge)?)
                .bind(edge.tenant_id.to_string())
                .bind(edge.id.to_string())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "lineage_edge".to_string(),
                id: edge.id.to_string(),
            });
        }
        Ok(())
    }
}

pub struct SqliteCheckStore {
    pool: SqlitePool,
}

impl SqliteCheckStore {
    fn hydrate(row: &sqlx::sqlite::SqliteRow) -> Result<IntegrityCheck, StoreError> {
        let mut check: IntegrityCheck = decode(row.get::<String, _>("data").as_str())?;
        // The claim columns are authoritative; the JSON copy may be stale.
        check.claim = match (
            row.get::<Option<String>, _>("claim_token"),
            row.get::<Option<String>, _>("claim_slot"),
            row.get::<Option<String>, _>("claim_expires"),
        ) {
            (Some(token), Some(slot), Some(expires)) => Some(RunClaim {
                owner_token: Uuid::parse_str(&token)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
                slot: parse_timestamp(&slot)?,
                expires_at: parse_timestamp(&expires)?,
            }),
            _ => None,
        };
        Ok(check)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl CheckStore for SqliteCheckStore {
    async fn insert(&self, check: &IntegrityCheck) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO integrity_checks (id, tenant_id, name, next_run_at, active, data)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(check.id.to_string())
        .bind(check.tenant_id.to_string())
        .bind(&check.name)
        .bind(check.next_run_at.map(|t| t.to_rfc3339()))
        .bind(check.active)
        .bind(encode(check)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<IntegrityCheck>, StoreError> {
        let row = sqlx::query("SELECT * FROM integrity_checks WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::hydrate).transpose()
    }

    async fn find_by_name(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<IntegrityCheck>, StoreError> {
        let row = sqlx::query("SELECT * FROM integrity_checks WHERE tenant_id = ? AND name = ?")
            .bind(tenant_id.to_string())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::hydrate).transpose()
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &CheckFilter,
    ) -> Result<Vec<IntegrityCheck>, StoreError> {
        let rows = sqlx::query("SELECT * FROM integrity_checks WHERE tenant_id = ? ORDER BY name")
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        let mut checks = Vec::with_capacity(rows.len());
        for row in &rows {
            let check = Self::hydrate(row)?;
            if let Some(asset_id) = filter.asset_id {
                if check.asset_id != Some(asset_id) {
                    continue;
                }
            }
            if filter.failed_only
                && !check.last_result.map(|r| r.is_failure()).unwrap_or(false)
            {
                continue;
            }
            checks.push(check);
        }
        Ok(checks)
    }

    async fn update(&self, check: &IntegrityCheck) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE integrity_checks
            SET name = ?, next_run_at = ?, active = ?, data = ?
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(&check.name)
        .bind(check.next_run_at.map(|t| t.to_rfc3339()))
        .bind(check.active)
        .bind(encode(check)?)
        .bind(check.tenant_id.to_string())
        .bind(check.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "integrity_check".to_string(),
                id: check.id.to_string(),
            });
        }
        Ok(())
    }

    async fn due(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<IntegrityCheck>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM integrity_checks
            WHERE tenant_id = ? AND active = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?
            ORDER BY next_run_at
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::hydrate).collect()
    }

    async fn claim(
        &self,
        tenant_id: Uuid,
        check_id: Uuid,
        claim: &RunClaim,
    ) -> Result<bool, StoreError> {
        // Single conditional UPDATE: succeeds only when no live claim exists.
        let result = sqlx::query(
            r#"
            UPDATE integrity_checks
            SET claim_token = ?, claim_slot = ?, claim_expires = ?
            WHERE tenant_id = ? AND id = ?
              AND (claim_token IS NULL OR claim_expires <= ?)
            "#,
        )
        .bind(claim.owner_token.to_string())
        .bind(claim.slot.to_rfc3339())
        .bind(claim.expires_at.to_rfc3339())
        .bind(tenant_id.to_string())
        .bind(check_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(
        &self,
        tenant_id: Uuid,
        check_id: Uuid,
        owner_token: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE integrity_checks
            SET claim_token = NULL, claim_slot = NULL, claim_expires = NULL
            WHERE tenant_id = ? AND id = ? AND claim_token = ?
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(check_id.to_string())
        .bind(owner_token.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_run(&self, run: &CheckRun) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO check_runs (id, tenant_id, check_id, asset_id, finished_at, data)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.id.to_string())
        .bind(run.tenant_id.to_string())
        .bind(run.check_id.to_string())
        .bind(run.asset_id.map(|id| id.to_string()))
        .bind(run.finished_at.to_rfc3339())
        .bind(encode(run)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn runs_for_asset(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CheckRun>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM check_runs
            WHERE tenant_id = ? AND asset_id = ? AND finished_at >= ?
            ORDER BY finished_at
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(asset_id.to_string())
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }
}

pub struct SqliteBreakStore {
    pool: SqlitePool,
}

#[async_trait]
impl BreakStore for SqliteBreakStore {
    async fn insert(&self, event: &BreakEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO break_events (id, tenant_id, asset_id, status, severity, detected_at, data)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.tenant_id.to_string())
        .bind(event.asset_id.map(|id| id.to_string()))
        .bind(event.status.as_db_str())
        .bind(event.severity.as_db_str())
        .bind(event.detected_at.to_rfc3339())
        .bind(encode(event)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<BreakEvent>, StoreError> {
        let row = sqlx::query("SELECT data FROM break_events WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: &BreakFilter,
    ) -> Result<Vec<BreakEvent>, StoreError> {
        let limit = filter.limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT data FROM break_events
            WHERE tenant_id = ?
              AND (? IS NULL OR status = ?)
              AND (? IS NULL OR severity = ?)
              AND (? IS NULL OR asset_id = ?)
            ORDER BY detected_at DESC
            LIMIT ?
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(filter.status.map(|s| s.as_db_str()))
        .bind(filter.status.map(|s| s.as_db_str()))
        .bind(filter.severity.map(|s| s.as_db_str()))
        .bind(filter.severity.map(|s| s.as_db_str()))
        .bind(filter.asset_id.map(|id| id.to_string()))
        .bind(filter.asset_id.map(|id| id.to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn open_for_asset(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<BreakEvent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM break_events
            WHERE tenant_id = ? AND asset_id = ? AND status IN ('open', 'investigating')
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(asset_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn update(&self, event: &BreakEvent) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE break_events SET status = ?, data = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(event.status.as_db_str())
        .bind(encode(event)?)
        .bind(event.tenant_id.to_string())
        .bind(event.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "break_event".to_string(),
                id: event.id.to_string(),
            });
        }
        Ok(())
    }
}

pub struct SqliteRiskStore {
    pool: SqlitePool,
}

#[async_trait]
impl RiskStore for SqliteRiskStore {
    async fn append(&self, score: &RiskScore) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO risk_scores (id, tenant_id, asset_id, overall_score, computed_at, data)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(score.id.to_string())
        .bind(score.tenant_id.to_string())
        .bind(score.asset_id.to_string())
        .bind(score.overall_score as i64)
        .bind(score.computed_at.to_rfc3339())
        .bind(encode(score)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Option<RiskScore>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT data FROM risk_scores
            WHERE tenant_id = ? AND asset_id = ?
            ORDER BY computed_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(asset_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn latest_per_asset(
        &self,
        tenant_id: Uuid,
        min_score: u8,
    ) -> Result<Vec<RiskScore>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.data FROM risk_scores s
            JOIN (
                SELECT asset_id, MAX(computed_at) AS latest
                FROM risk_scores WHERE tenant_id = ?
                GROUP BY asset_id
            ) x ON s.asset_id = x.asset_id AND s.computed_at = x.latest
            WHERE s.tenant_id = ? AND s.overall_score >= ?
            ORDER BY s.overall_score DESC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(tenant_id.to_string())
        .bind(min_score as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }

    async fn history(
        &self,
        tenant_id: Uuid,
        asset_id: Uuid,
    ) -> Result<Vec<RiskScore>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM risk_scores
            WHERE tenant_id = ? AND asset_id = ?
            ORDER BY computed_at DESC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(asset_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| decode(r.get::<String, _>("data").as_str()))
            .collect()
    }
}

pub struct SqlitePeriodStore {
    pool: SqlitePool,
}

#[async_trait]
impl PeriodStore for SqlitePeriodStore {
    async fn insert(&self, period: &AuditPeriod) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_periods (id, tenant_id, starts_at, ends_at, status, data)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(period.id.to_string())
        .bind(period.tenant_id.to_string())
        .bind(period.starts_at.to_rfc3339())
        .bind(period.ends_at.to_rfc3339())
        .bind(period.status.as_db_str())
        .bind(encode(period)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<AuditPeriod>, StoreError> {
        let row = sqlx::query("SELECT data FROM audit_periods WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn covering(
        &self,
        tenant_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<AuditPeriod>, StoreError> {
        let at = at.to_rfc3339();
        let row = sqlx::query(
            "SELECT data FROM audit_periods WHERE tenant_id = ? AND starts_at <= ? AND ends_at > ?",
        )
        .bind(tenant_id.to_string())
        .bind(&at)
        .bind(&at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| decode(r.get::<String, _>("data").as_str()))
            .transpose()
    }

    async fn update(&self, period: &AuditPeriod) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE audit_periods SET status = ?, data = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(period.status.as_db_str())
        .bind(encode(period)?)
        .bind(period.tenant_id.to_string())
        .bind(period.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "audit_period".to_string(),
                id: period.id.to_string(),
            });
        }
        Ok(())
    }
}
