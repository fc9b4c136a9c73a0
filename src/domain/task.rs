//! Descriptors exchanged with the task manager.
//!
//! The task manager owns scheduled task records. This crate only builds a
//! [`NewScheduledTask`] to stage inside a transaction and consumes a
//! [`FiredTask`] when the deadline passes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::exhibition::ExhibitionEvent;
use super::ids::ExhibitionId;
use crate::error::{Result, VernissageError};

/// Deadline kinds, each replayed as one exhibition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    AutoStartEnrolling,
    AutoEndEnrolling,
    AutoStartRunning,
    AutoEnd,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::AutoStartEnrolling,
        TaskType::AutoEndEnrolling,
        TaskType::AutoStartRunning,
        TaskType::AutoEnd,
    ];

    /// Stable numeric code used by task stores.
    pub fn code(self) -> i16 {
        match self {
            TaskType::AutoStartEnrolling => 1,
            TaskType::AutoEndEnrolling => 2,
            TaskType::AutoStartRunning => 3,
            TaskType::AutoEnd => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::AutoStartEnrolling => "auto_start_enrolling",
            TaskType::AutoEndEnrolling => "auto_end_enrolling",
            TaskType::AutoStartRunning => "auto_start_running",
            TaskType::AutoEnd => "auto_end",
        }
    }

    pub fn event(self) -> ExhibitionEvent {
        match self {
            TaskType::AutoStartEnrolling => ExhibitionEvent::StartEnrolling,
            TaskType::AutoEndEnrolling => ExhibitionEvent::EndEnrolling,
            TaskType::AutoStartRunning => ExhibitionEvent::StartRunning,
            TaskType::AutoEnd => ExhibitionEvent::End,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried by every deadline task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlinePayload {
    pub exhibition_id: ExhibitionId,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub deadline: DateTime<Utc>,
}

/// A task to be staged in the caller's transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScheduledTask {
    pub task_type: TaskType,
    pub custom_id: String,
    pub payload: Vec<u8>,
    pub fire_at: DateTime<Utc>,
}

impl NewScheduledTask {
    pub fn deadline(
        task_type: TaskType,
        exhibition_id: ExhibitionId,
        fire_at: DateTime<Utc>,
    ) -> Result<Self> {
        let payload = serde_json::to_vec(&DeadlinePayload {
            exhibition_id,
            deadline: fire_at,
        })?;
        Ok(Self {
            task_type,
            custom_id: exhibition_id.to_string(),
            payload,
            fire_at,
        })
    }
}

/// A due task delivered by the task manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTask {
    pub id: Uuid,
    pub task_type: TaskType,
    pub custom_id: String,
    pub payload: Vec<u8>,
    pub fire_at: DateTime<Utc>,
}

impl FiredTask {
    pub fn exhibition_id(&self) -> Result<ExhibitionId> {
        self.custom_id.parse().map_err(|e| {
            VernissageError::ValidationError(format!(
                "task {} carries malformed exhibition id '{}': {e}",
                self.id, self.custom_id
            ))
        })
    }

    pub fn payload(&self) -> Result<DeadlinePayload> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let codes: Vec<i16> = TaskType::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn deadline_task_addresses_exhibition() {
        let id = ExhibitionId::new();
        let at = DateTime::from_timestamp(1_900_000_000, 0).unwrap();
        let task = NewScheduledTask::deadline(TaskType::AutoEnd, id, at).unwrap();
        assert_eq!(task.custom_id, id.to_string());

        let json: serde_json::Value = serde_json::from_slice(&task.payload).unwrap();
        assert_eq!(json["deadline"], 1_900_000_000);
        assert_eq!(json["exhibition_id"], id.to_string());
    }

    #[test]
    fn malformed_custom_id_is_a_validation_error() {
        let task = FiredTask {
            id: Uuid::new_v4(),
            task_type: TaskType::AutoEnd,
            custom_id: "not-a-uuid".into(),
            payload: Vec::new(),
            fire_at: Utc::now(),
        };
        assert!(matches!(
            task.exhibition_id(),
            Err(VernissageError::ValidationError(_))
        ));
    }
}
