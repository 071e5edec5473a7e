//! Error taxonomy for the lineage and integrity engine.
//!
//! Validation failures are rejected synchronously and never retried.
//! `ConcurrencyConflict` and store-level write conflicts are retried once
//! internally before being surfaced to the caller as retryable.

use crate::models::breaks::BreakStatus;
use crate::store::StoreError;
use crate::tenant::Role;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Edge source and target are the same asset: {asset_id}")]
    SelfLoop { asset_id: Uuid },

    #[error("Asset '{name}' version {version} already exists")]
    DuplicateAsset { name: String, version: i64 },

    #[error("Data source '{0}' already exists")]
    DuplicateSource(String),

    #[error("Integrity check '{0}' already exists")]
    DuplicateCheck(String),

    #[error("Integrity check requires an asset or edge target")]
    MissingTarget,

    #[error("Edge {source_id} -> {target_id} would create a cycle in the lineage graph")]
    CycleDetected { source_id: Uuid, target_id: Uuid },

    #[error("Audit period '{period}' is closed for modification")]
    PeriodClosed { period: String },

    #[error("Asset {asset_id} has unknown origin and must be classified before propagating")]
    OrphanPropagationBlocked { asset_id: Uuid },

    #[error("Check execution failed: {0}")]
    CheckExecution(String),

    #[error("Concurrent modification conflict, retry the operation")]
    ConcurrencyConflict,

    #[error("Operation requires {required} role (actor: {actor})")]
    Unauthorized { required: Role, actor: Uuid },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Invalid break event transition from {from} to {to}")]
    InvalidTransition { from: BreakStatus, to: BreakStatus },

    #[error("Resolving a break event requires non-empty resolution notes")]
    MissingResolutionNotes,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Returns `true` if the caller may safely retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConcurrencyConflict | EngineError::Store(StoreError::Conflict(_))
        )
    }

    /// Returns `true` for synchronous validation rejections.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::SelfLoop { .. }
                | EngineError::DuplicateAsset { .. }
                | EngineError::DuplicateSource(_)
                | EngineError::DuplicateCheck(_)
                | EngineError::MissingTarget
                | EngineError::InvalidTransition { .. }
                | EngineError::MissingResolutionNotes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::ConcurrencyConflict.is_retryable());
        assert!(EngineError::Store(StoreError::Conflict("edge".into())).is_retryable());
        assert!(!EngineError::CheckExecution("deactivated".into()).is_retryable());
        assert!(!EngineError::MissingTarget.is_retryable());
        assert!(!EngineError::CycleDetected {
            source_id: Uuid::new_v4(),
            target_id: Uuid::new_v4()
        }
        .is_retryable());
        assert!(EngineError::CycleDetected {
            source_id: Uuid::new_v4(),
            target_id: Uuid::new_v4()
        }
        .to_string()
        .contains("would create a cycle"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(EngineError::MissingTarget.is_validation());
        assert!(EngineError::DuplicateSource("warehouse".into()).is_validation());
        assert!(!EngineError::ConcurrencyConflict.is_validation());
    }
}
