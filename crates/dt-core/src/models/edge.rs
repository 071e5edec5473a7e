//! Lineage edge model.
//!
//! A `LineageEdge` is a directed arc between two assets recording that a
//! transformation occurred. `(tenant, source, target, kind)` is unique among
//! active edges, self-loops are forbidden, and committed edges never close a
//! directed cycle through the active subgraph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag of a lineage arc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    DerivesFrom,
    TransformsTo,
    CopiesTo,
    AggregatesFrom,
}

impl EdgeKind {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            EdgeKind::DerivesFrom => "derives_from",
            EdgeKind::TransformsTo => "transforms_to",
            EdgeKind::CopiesTo => "copies_to",
            EdgeKind::AggregatesFrom => "aggregates_from",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// Direction for lineage traversal queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Walk inbound edges towards origins.
    Upstream,
    /// Walk outbound edges towards consumers.
    Downstream,
}

/// A directed arc of the lineage graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEdge {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Source vertex.
    pub source_asset_id: Uuid,
    /// Target vertex.
    pub target_asset_id: Uuid,
    /// Type tag of the arc.
    pub kind: EdgeKind,
    /// Free-text description of the transformation.
    pub transformation_note: Option<String>,
    /// `true` once an admin has confirmed the edge reflects reality.
    pub validated: bool,
    pub validated_by: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    /// Soft-deletion flag; only active edges are graph arcs.
    pub active: bool,
    /// Actor who created the edge.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LineageEdge {
    /// Creates a new active, unvalidated edge.
    pub fn new(
        tenant_id: Uuid,
        source_asset_id: Uuid,
        target_asset_id: Uuid,
        kind: EdgeKind,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            source_asset_id,
            target_asset_id,
            kind,
            transformation_note: None,
            validated: false,
            validated_by: None,
            validated_at: None,
            active: true,
            created_by,
            created_at: Utc::now(),
        }
    }
}

/// Result of an edge-creation request.
///
/// `created` is `false` when an identical active edge already existed and
/// the request was treated as an idempotent replay.
#[derive(Debug, Clone)]
pub struct EdgeOutcome {
    pub edge: LineageEdge,
    pub created: bool,
}
