//! Exhibitions and their lifecycle.
//!
//! ```text
//! Preparing ──submit──> Pending ──approve──> Approved ──startEnrolling*──> Enrolling
//!     ^                    │                                                   │
//!     └──────reject────────┘                                          endEnrolling*
//!                                                                              v
//!           Ended <──end*── Running <──startRunning*── EnrollingEnded
//!
//! cancel: Preparing | Approved | Enrolling | EnrollingEnded ──> Cancelled
//! (* normally fired by a scheduled deadline)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::EntityKind;
use super::ids::{ExhibitionId, ServiceProviderId};
use super::lifecycle::{Lifecycle, Milestones};
use super::task::TaskType;
use crate::error::{Result, VernissageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum ExhibitionStatus {
    Preparing,
    Pending,
    Approved,
    Enrolling,
    EnrollingEnded,
    Running,
    Ended,
    Cancelled,
}

impl ExhibitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhibitionStatus::Preparing => "preparing",
            ExhibitionStatus::Pending => "pending",
            ExhibitionStatus::Approved => "approved",
            ExhibitionStatus::Enrolling => "enrolling",
            ExhibitionStatus::EnrollingEnded => "enrolling_ended",
            ExhibitionStatus::Running => "running",
            ExhibitionStatus::Ended => "ended",
            ExhibitionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExhibitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhibitionEvent {
    Submit,
    Approve,
    Reject,
    StartEnrolling,
    EndEnrolling,
    StartRunning,
    End,
    Cancel,
}

impl ExhibitionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhibitionEvent::Submit => "submit",
            ExhibitionEvent::Approve => "approve",
            ExhibitionEvent::Reject => "reject",
            ExhibitionEvent::StartEnrolling => "start_enrolling",
            ExhibitionEvent::EndEnrolling => "end_enrolling",
            ExhibitionEvent::StartRunning => "start_running",
            ExhibitionEvent::End => "end",
            ExhibitionEvent::Cancel => "cancel",
        }
    }

    /// The deadline this transition arms, if any.
    pub fn arms(&self) -> Option<TaskType> {
        match self {
            ExhibitionEvent::Approve => Some(TaskType::AutoStartEnrolling),
            ExhibitionEvent::StartEnrolling => Some(TaskType::AutoEndEnrolling),
            ExhibitionEvent::EndEnrolling => Some(TaskType::AutoStartRunning),
            ExhibitionEvent::StartRunning => Some(TaskType::AutoEnd),
            _ => None,
        }
    }

    pub fn milestones(&self, now: DateTime<Utc>) -> Milestones {
        match self {
            ExhibitionEvent::Submit => Milestones::submitted(now),
            ExhibitionEvent::Approve => Milestones::approved(now),
            ExhibitionEvent::Reject => Milestones::review_closed(),
            _ => Milestones::keep(),
        }
    }
}

impl std::fmt::Display for ExhibitionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ExhibitionLifecycle;

impl Lifecycle for ExhibitionLifecycle {
    type Status = ExhibitionStatus;
    type Event = ExhibitionEvent;

    const ENTITY: EntityKind = EntityKind::Exhibition;
    const INITIAL: ExhibitionStatus = ExhibitionStatus::Preparing;
    const STATUSES: &'static [ExhibitionStatus] = &[
        ExhibitionStatus::Preparing,
        ExhibitionStatus::Pending,
        ExhibitionStatus::Approved,
        ExhibitionStatus::Enrolling,
        ExhibitionStatus::EnrollingEnded,
        ExhibitionStatus::Running,
        ExhibitionStatus::Ended,
        ExhibitionStatus::Cancelled,
    ];
    const EVENTS: &'static [ExhibitionEvent] = &[
        ExhibitionEvent::Submit,
        ExhibitionEvent::Approve,
        ExhibitionEvent::Reject,
        ExhibitionEvent::StartEnrolling,
        ExhibitionEvent::EndEnrolling,
        ExhibitionEvent::StartRunning,
        ExhibitionEvent::End,
        ExhibitionEvent::Cancel,
    ];

    fn target(status: ExhibitionStatus, event: ExhibitionEvent) -> Option<ExhibitionStatus> {
        use ExhibitionEvent as E;
        use ExhibitionStatus as S;

        match (status, event) {
            (S::Preparing, E::Submit) => Some(S::Pending),
            (S::Pending, E::Approve) => Some(S::Approved),
            (S::Pending, E::Reject) => Some(S::Preparing),
            (S::Approved, E::StartEnrolling) => Some(S::Enrolling),
            (S::Enrolling, E::EndEnrolling) => Some(S::EnrollingEnded),
            (S::EnrollingEnded, E::StartRunning) => Some(S::Running),
            (S::Running, E::End) => Some(S::Ended),
            (S::Preparing | S::Approved | S::Enrolling | S::EnrollingEnded, E::Cancel) => {
                Some(S::Cancelled)
            }
            _ => None,
        }
    }
}

/// The four instants that drive an exhibition's scheduled transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhibitionSchedule {
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ExhibitionSchedule {
    /// Checks ordering and that registration does not open earlier than
    /// `now - lead_tolerance`.
    pub fn validate(&self, now: DateTime<Utc>, lead_tolerance: Duration) -> Result<()> {
        if self.registration_start > self.registration_end {
            return Err(VernissageError::ValidationError(
                "registration start must not be after registration end".into(),
            ));
        }
        if self.registration_end >= self.start_time {
            return Err(VernissageError::ValidationError(
                "registration must end before the exhibition starts".into(),
            ));
        }
        if self.start_time >= self.end_time {
            return Err(VernissageError::ValidationError(
                "exhibition must start before it ends".into(),
            ));
        }
        if self.registration_start < now - lead_tolerance {
            return Err(VernissageError::ValidationError(
                "registration start is in the past".into(),
            ));
        }
        Ok(())
    }

    /// Instant at which a task of `task_type` is due.
    pub fn fire_time(&self, task_type: TaskType) -> DateTime<Utc> {
        match task_type {
            TaskType::AutoStartEnrolling => self.registration_start,
            TaskType::AutoEndEnrolling => self.registration_end,
            TaskType::AutoStartRunning => self.start_time,
            TaskType::AutoEnd => self.end_time,
        }
    }
}

/// Descriptive attributes, never touched by lifecycle transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhibitionDetails {
    pub title: String,
    pub website: String,
    pub industry: String,
    pub tags: Vec<String>,
    pub country: String,
    pub city: String,
    pub venue: String,
    pub venue_address: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExhibition {
    pub organizer_id: Option<ServiceProviderId>,
    pub details: ExhibitionDetails,
    pub schedule: ExhibitionSchedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exhibition {
    pub id: ExhibitionId,
    pub organizer_id: Option<ServiceProviderId>,
    pub details: ExhibitionDetails,
    pub schedule: ExhibitionSchedule,
    pub status: ExhibitionStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Exhibition {
    pub fn create(input: NewExhibition, now: DateTime<Utc>) -> Self {
        Self {
            id: ExhibitionId::new(),
            organizer_id: input.organizer_id,
            details: input.details,
            schedule: input.schedule,
            status: ExhibitionLifecycle::INITIAL,
            version: 0,
            created_at: now,
            submitted_at: None,
            approved_at: None,
            updated_at: now,
        }
    }
}
