//! Data asset model.
//!
//! A `DataAsset` is a tracked data element: a table, column, file, record,
//! or field. Assets form the vertex set of the lineage graph. The
//! `(tenant, name, version)` triple is unique; redefining an existing name
//! creates a new row with `version + 1` rather than overwriting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of tracked data element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Table,
    Column,
    File,
    Record,
    Field,
}

impl AssetKind {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AssetKind::Table => "table",
            AssetKind::Column => "column",
            AssetKind::File => "file",
            AssetKind::Record => "record",
            AssetKind::Field => "field",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// A tracked data element; a vertex of the lineage graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAsset {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Origin system, if recorded.
    pub source_id: Option<Uuid>,
    /// Name; `(tenant, name, version)` is unique.
    pub name: String,
    /// Kind of data element.
    pub kind: AssetKind,
    /// External identifier in the origin system.
    pub external_id: Option<String>,
    /// `true` while the asset has zero active inbound edges. Cleared by the
    /// graph engine when inbound provenance is recorded, or by explicit
    /// manual classification.
    pub origin_unknown: bool,
    /// Set when a timeliness check found this asset's data arriving late.
    pub arrived_late: bool,
    /// Redefinition counter, starting at 1.
    pub version: i64,
    /// Soft-deletion flag.
    pub active: bool,
    /// Actor who registered the asset.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataAsset {
    /// Creates a new active asset at version 1 with unknown origin.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, kind: AssetKind, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            source_id: None,
            name: name.into(),
            kind,
            external_id: None,
            origin_unknown: true,
            arrived_late: false,
            version: 1,
            active: true,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_asset_defaults() {
        let asset = DataAsset::new(Uuid::new_v4(), "orders", AssetKind::Table, Uuid::new_v4());
        assert!(asset.origin_unknown);
        assert!(!asset.arrived_late);
        assert_eq!(asset.version, 1);
        assert!(asset.active);
    }

    #[test]
    fn test_kind_db_str() {
        assert_eq!(AssetKind::Column.as_db_str(), "column");
        assert_eq!(AssetKind::Record.to_string(), "record");
    }
}
