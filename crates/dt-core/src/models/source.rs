//! Data source model.
//!
//! A `DataSource` is an origin system (database, API, file drop, stream, or
//! manual entry) from which tracked assets originate. Sources are never
//! physically deleted; they are soft-deactivated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Kind of origin system.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Relational or analytical database.
    Database,
    /// External or internal API.
    Api,
    /// File-based delivery (batch drops, exports).
    File,
    /// Streaming feed.
    Stream,
    /// Manually entered data.
    Manual,
}

impl SourceKind {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SourceKind::Database => "database",
            SourceKind::Api => "api",
            SourceKind::File => "file",
            SourceKind::Stream => "stream",
            SourceKind::Manual => "manual",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

/// An origin system tracked by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Name, unique per tenant.
    pub name: String,
    /// Kind of origin system.
    pub kind: SourceKind,
    /// Opaque connection descriptor (host, path, topic, ...).
    pub connection: HashMap<String, String>,
    /// Soft-deletion flag.
    pub active: bool,
    /// Last time data was observed arriving from this source.
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Actor who registered the source.
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    /// Creates a new active source.
    pub fn new(tenant_id: Uuid, name: impl Into<String>, kind: SourceKind, created_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            kind,
            connection: HashMap::new(),
            active: true,
            last_seen_at: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Updates the last-seen timestamp.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_seen_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_is_active() {
        let src = DataSource::new(Uuid::new_v4(), "warehouse", SourceKind::Database, Uuid::new_v4());
        assert!(src.active);
        assert!(src.last_seen_at.is_none());
    }

    #[test]
    fn test_touch_sets_last_seen() {
        let mut src = DataSource::new(Uuid::new_v4(), "feed", SourceKind::Stream, Uuid::new_v4());
        src.touch();
        assert!(src.last_seen_at.is_some());
    }

    #[test]
    fn test_kind_db_str() {
        assert_eq!(SourceKind::Manual.as_db_str(), "manual");
        assert_eq!(SourceKind::Api.to_string(), "api");
    }
}
