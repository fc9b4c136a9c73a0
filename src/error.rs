//! Error types for the workflow engine.

use thiserror::Error;

use crate::domain::EntityKind;
use crate::domain::task::TaskType;

/// Result type alias using the vernissage error type.
pub type Result<T> = std::result::Result<T, VernissageError>;

/// Main error type for lifecycle workflows.
#[derive(Error, Debug)]
pub enum VernissageError {
    /// The addressed entity does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: EntityKind, key: String },

    /// The event has no entry in the entity's transition table for its current status
    #[error("{entity} {key}: current status '{current}' does not accept event '{event}'")]
    IllegalTransition {
        entity: EntityKind,
        key: String,
        current: String,
        event: String,
    },

    /// The conditional write matched no row: another writer moved the entity first
    #[error(
        "{entity} {key}: concurrent modification while handling '{event}' (expected version {expected_version})"
    )]
    ConcurrentModification {
        entity: EntityKind,
        key: String,
        event: String,
        expected_version: i64,
    },

    /// The task manager refused to stage the next deadline; the transition was rolled back
    #[error("{entity} {key}: failed to schedule {task_type}: {source}")]
    SchedulingFailure {
        entity: EntityKind,
        key: String,
        task_type: TaskType,
        #[source]
        source: anyhow::Error,
    },

    /// A uniqueness constraint rejected an insert
    #[error("{entity} already exists ({constraint})")]
    Conflict {
        entity: EntityKind,
        constraint: String,
    },

    /// Input rejected before touching storage
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A storage collaborator failed while an event was being handled
    #[error("{entity} {key}: '{event}' failed: {source:#}")]
    Collaborator {
        entity: EntityKind,
        key: String,
        event: String,
        #[source]
        source: anyhow::Error,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VernissageError {
    /// Whether re-reading the entity and re-issuing the same event may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            VernissageError::ConcurrentModification { .. } | VernissageError::Collaborator { .. }
        )
    }

    /// Attach the entity key and event to an untyped collaborator error.
    ///
    /// Typed errors pass through unchanged so callers can still match on them.
    pub(crate) fn during(self, entity: EntityKind, key: &str, event: &str) -> Self {
        match self {
            VernissageError::Other(source) => VernissageError::Collaborator {
                entity,
                key: key.to_string(),
                event: event.to_string(),
                source,
            },
            other => other,
        }
    }

    /// Short label used for the `outcome` metric dimension.
    pub(crate) fn outcome_label(&self) -> &'static str {
        match self {
            VernissageError::NotFound { .. } => "not_found",
            VernissageError::IllegalTransition { .. } => "illegal",
            VernissageError::ConcurrentModification { .. } => "conflict",
            VernissageError::SchedulingFailure { .. } => "scheduling_failed",
            VernissageError::Conflict { .. } => "duplicate",
            VernissageError::ValidationError(_) => "invalid",
            VernissageError::Collaborator { .. }
            | VernissageError::Serialization(_)
            | VernissageError::Other(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untyped_errors_pick_up_entity_and_event() {
        let err = VernissageError::Other(anyhow::anyhow!("connection reset"));
        let wrapped = err.during(EntityKind::Merchant, "abc", "approve");

        assert!(matches!(
            &wrapped,
            VernissageError::Collaborator { entity: EntityKind::Merchant, key, event, .. }
                if key == "abc" && event == "approve"
        ));
        assert!(wrapped.is_retriable());
        assert!(wrapped.to_string().contains("connection reset"));
    }

    #[test]
    fn typed_errors_pass_through() {
        let err = VernissageError::NotFound {
            entity: EntityKind::Exhibition,
            key: "x".into(),
        };
        let same = err.during(EntityKind::Exhibition, "x", "submit");
        assert!(matches!(same, VernissageError::NotFound { .. }));
        assert!(!same.is_retriable());
    }

    #[test]
    fn illegal_transition_names_state_and_event() {
        let err = VernissageError::IllegalTransition {
            entity: EntityKind::Exhibition,
            key: "e1".into(),
            current: "approved".into(),
            event: "approve".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'approved'"));
        assert!(msg.contains("'approve'"));
    }
}
