//! # dt-core
//!
//! Core engine for DataTrail: multi-tenant data lineage tracking and
//! integrity-break detection.
//!
//! This crate provides the asset registry, the acyclic lineage graph
//! engine, the scheduled integrity check engine, the break event detector
//! with its resolution state machine, and the risk scoring engine, all
//! wired together by the [`TrailEngine`] facade over pluggable stores.

pub mod audit;
pub mod breaks;
pub mod checks;
pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod models;
pub mod registry;
pub mod risk;
pub mod store;
pub mod tenant;

pub use breaks::BreakDetector;
pub use checks::{CheckEngine, DataProbe, MockProbe, NewCheck, Observation, ProbeError};
pub use config::{BreakPenalties, EngineConfig, RetryPolicy, RiskWeights};
pub use engine::{EngineStores, SchedulerPass, TrailEngine};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus};
pub use graph::{EdgeRequest, LineageGraph};
pub use models::{
    AssetKind, AuditPeriod, BreakEvent, BreakKind, BreakStatus, CheckKind, CheckResult, CheckRun,
    DataAsset, DataSource, Direction, EdgeKind, EdgeOutcome, IntegrityCheck, LineageEdge,
    PeriodStatus, RiskScore, RunClaim, Severity, SourceKind,
};
pub use registry::AssetRegistry;
pub use risk::RiskEngine;
pub use store::{AssetFilter, BreakFilter, CheckFilter, MemoryStores, StoreError};
pub use tenant::{Role, TenantContext};

pub use audit::{AuditEntry, AuditEventType, AuditTrail};
