//! Data models for the lineage and integrity engine.
//!
//! Six persisted record collections, each tenant-partitioned: sources,
//! assets, edges, checks, break events, and risk scores, plus audit
//! periods and the check run history.

pub mod asset;
pub mod breaks;
pub mod check;
pub mod edge;
pub mod period;
pub mod risk;
pub mod source;

pub use asset::{AssetKind, DataAsset};
pub use breaks::{BreakEvent, BreakKind, BreakStatus, Severity};
pub use check::{CheckKind, CheckResult, CheckRun, IntegrityCheck, RunClaim};
pub use edge::{Direction, EdgeKind, EdgeOutcome, LineageEdge};
pub use period::{AuditPeriod, PeriodStatus};
pub use risk::RiskScore;
pub use source::{DataSource, SourceKind};
