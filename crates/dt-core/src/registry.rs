//! Asset registry.
//!
//! Owns the `DataSource` and `DataAsset` collections, the vertex set of
//! the lineage graph. Sources and assets are soft-deactivated, never
//! physically deleted. Redefining an asset under an existing name creates a
//! new row at `version + 1` rather than overwriting.

use crate::audit::{AuditEntry, AuditEventType, AuditTrail};
use crate::error::EngineError;
use crate::models::{AssetKind, DataAsset, DataSource, SourceKind};
use crate::store::{AssetFilter, AssetStore, SourceStore, StoreError};
use crate::tenant::{Role, TenantContext};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Registry service over the source and asset stores.
pub struct AssetRegistry {
    sources: Arc<dyn SourceStore>,
    assets: Arc<dyn AssetStore>,
    audit: Arc<AuditTrail>,
}

impl AssetRegistry {
    pub fn new(
        sources: Arc<dyn SourceStore>,
        assets: Arc<dyn AssetStore>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            sources,
            assets,
            audit,
        }
    }

    /// Registers a new data source. Names are unique per tenant.
    #[instrument(skip(self, ctx, connection), fields(tenant = %ctx.tenant_id))]
    pub async fn register_source(
        &self,
        ctx: &TenantContext,
        name: &str,
        kind: SourceKind,
        connection: HashMap<String, String>,
    ) -> Result<DataSource, EngineError> {
        ctx.require(Role::Member)?;
        if self
            .sources
            .find_by_name(ctx.tenant_id, name)
            .await?
            .is_some()
        {
            return Err(EngineError::DuplicateSource(name.to_string()));
        }
        let mut source = DataSource::new(ctx.tenant_id, name, kind, ctx.actor_id);
        source.connection = connection;
        match self.sources.insert(&source).await {
            Ok(()) => {}
            Err(StoreError::Constraint(_)) => {
                return Err(EngineError::DuplicateSource(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::SourceRegistered,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "data_source",
                    source.id,
                    format!("Registered data source '{name}'"),
                )
                .with_details(serde_json::json!({"kind": kind.as_db_str()})),
            )
            .await;
        Ok(source)
    }

    /// Registers a new data asset. If the name already exists for the
    /// tenant, the new row gets the next version number; the asset starts
    /// with `origin_unknown = true` until inbound lineage is recorded.
    #[instrument(skip(self, ctx), fields(tenant = %ctx.tenant_id))]
    pub async fn register_asset(
        &self,
        ctx: &TenantContext,
        name: &str,
        kind: AssetKind,
        source_id: Option<Uuid>,
        external_id: Option<String>,
    ) -> Result<DataAsset, EngineError> {
        ctx.require(Role::Member)?;
        if let Some(sid) = source_id {
            if self.sources.get(ctx.tenant_id, sid).await?.is_none() {
                return Err(EngineError::NotFound {
                    entity: "data_source",
                    id: sid,
                });
            }
        }
        let version = self
            .assets
            .max_version(ctx.tenant_id, name)
            .await?
            .unwrap_or(0)
            + 1;
        let mut asset = DataAsset::new(ctx.tenant_id, name, kind, ctx.actor_id);
        asset.source_id = source_id;
        asset.external_id = external_id;
        asset.version = version;
        match self.assets.insert(&asset).await {
            Ok(()) => {}
            Err(StoreError::Constraint(_)) => {
                // A concurrent writer took this version slot.
                return Err(EngineError::DuplicateAsset {
                    name: name.to_string(),
                    version,
                });
            }
            Err(e) => return Err(e.into()),
        }
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::AssetRegistered,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "data_asset",
                    asset.id,
                    format!("Registered data asset '{name}' v{version}"),
                )
                .with_details(serde_json::json!({
                    "kind": kind.as_db_str(),
                    "origin_unknown": asset.origin_unknown,
                })),
            )
            .await;
        Ok(asset)
    }

    /// Soft-deactivates a source.
    pub async fn deactivate_source(
        &self,
        ctx: &TenantContext,
        source_id: Uuid,
    ) -> Result<DataSource, EngineError> {
        ctx.require(Role::Member)?;
        let mut source = self
            .sources
            .get(ctx.tenant_id, source_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "data_source",
                id: source_id,
            })?;
        source.active = false;
        source.updated_at = chrono::Utc::now();
        self.sources.update(&source).await?;
        self.audit
            .record(AuditEntry::new(
                AuditEventType::SourceDeactivated,
                ctx.tenant_id,
                ctx.actor_id,
                "data_source",
                source_id,
                format!("Deactivated data source '{}'", source.name),
            ))
            .await;
        Ok(source)
    }

    /// Soft-deactivates an asset.
    pub async fn deactivate_asset(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<DataAsset, EngineError> {
        ctx.require(Role::Member)?;
        let mut asset = self.get_asset(ctx, asset_id).await?;
        asset.active = false;
        asset.updated_at = chrono::Utc::now();
        self.assets.update(&asset).await?;
        self.audit
            .record(AuditEntry::new(
                AuditEventType::AssetDeactivated,
                ctx.tenant_id,
                ctx.actor_id,
                "data_asset",
                asset_id,
                format!("Deactivated data asset '{}'", asset.name),
            ))
            .await;
        Ok(asset)
    }

    /// Manually classifies an asset's origin. Clearing the flag is the
    /// operator action that unblocks the asset as an edge source.
    pub async fn mark_origin_unknown(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
        origin_unknown: bool,
    ) -> Result<DataAsset, EngineError> {
        ctx.require(Role::Member)?;
        let mut asset = self.get_asset(ctx, asset_id).await?;
        asset.origin_unknown = origin_unknown;
        asset.updated_at = chrono::Utc::now();
        self.assets.update(&asset).await?;
        self.audit
            .record(
                AuditEntry::new(
                    AuditEventType::OriginClassified,
                    ctx.tenant_id,
                    ctx.actor_id,
                    "data_asset",
                    asset_id,
                    format!(
                        "Classified origin of '{}' as {}",
                        asset.name,
                        if origin_unknown { "unknown" } else { "known" }
                    ),
                )
                .with_details(serde_json::json!({"origin_unknown": origin_unknown})),
            )
            .await;
        Ok(asset)
    }

    /// Updates the last-seen timestamp of a source.
    pub async fn touch_source(
        &self,
        ctx: &TenantContext,
        source_id: Uuid,
    ) -> Result<(), EngineError> {
        ctx.require(Role::Member)?;
        let mut source = self
            .sources
            .get(ctx.tenant_id, source_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "data_source",
                id: source_id,
            })?;
        source.touch();
        self.sources.update(&source).await?;
        Ok(())
    }

    /// Lists sources for the tenant.
    pub async fn list_sources(
        &self,
        ctx: &TenantContext,
        active_only: bool,
    ) -> Result<Vec<DataSource>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self.sources.list(ctx.tenant_id, active_only).await?)
    }

    /// Lists assets, optionally filtered by source or orphans-only.
    pub async fn list_assets(
        &self,
        ctx: &TenantContext,
        filter: &AssetFilter,
    ) -> Result<Vec<DataAsset>, EngineError> {
        ctx.require(Role::Viewer)?;
        Ok(self.assets.list(ctx.tenant_id, filter).await?)
    }

    /// Fetches an asset or fails with `NotFound`.
    pub async fn get_asset(
        &self,
        ctx: &TenantContext,
        asset_id: Uuid,
    ) -> Result<DataAsset, EngineError> {
        ctx.require(Role::Viewer)?;
        self.assets
            .get(ctx.tenant_id, asset_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "data_asset",
                id: asset_id,
            })
    }

    /// Fetches a source or fails with `NotFound`.
    pub async fn get_source(
        &self,
        ctx: &TenantContext,
        source_id: Uuid,
    ) -> Result<DataSource, EngineError> {
        ctx.require(Role::Viewer)?;
        self.sources
            .get(ctx.tenant_id, source_id)
            .await?
            .ok_or(EngineError::NotFound {
                entity: "data_source",
                id: source_id,
            })
    }
}
