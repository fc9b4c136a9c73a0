//! A merchant's application to exhibit at one exhibition.
//!
//! Keyed by `(exhibition_id, merchant_id)`:
//!
//! ```text
//! Pending ──approve──> Approved
//!   │  ^                  │
//! reject└──reapply──┐     │
//!   v               │     │
//! Rejected ─────────┘     │
//! Pending | Approved ──withdraw──> Withdrawn
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityKind;
use super::ids::ApplicationKey;
use super::lifecycle::{Lifecycle, Milestones};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEvent {
    Approve,
    Reject,
    Reapply,
    Withdraw,
}

impl ApplicationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationEvent::Approve => "approve",
            ApplicationEvent::Reject => "reject",
            ApplicationEvent::Reapply => "reapply",
            ApplicationEvent::Withdraw => "withdraw",
        }
    }

    pub fn milestones(&self, now: DateTime<Utc>) -> Milestones {
        match self {
            ApplicationEvent::Approve => Milestones::approved(now),
            ApplicationEvent::Reject => Milestones::review_closed(),
            ApplicationEvent::Reapply => Milestones::submitted(now),
            ApplicationEvent::Withdraw => Milestones::keep(),
        }
    }
}

impl std::fmt::Display for ApplicationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ApplicationLifecycle;

impl Lifecycle for ApplicationLifecycle {
    type Status = ApplicationStatus;
    type Event = ApplicationEvent;

    const ENTITY: EntityKind = EntityKind::Application;
    const INITIAL: ApplicationStatus = ApplicationStatus::Pending;
    const STATUSES: &'static [ApplicationStatus] = &[
        ApplicationStatus::Pending,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];
    const EVENTS: &'static [ApplicationEvent] = &[
        ApplicationEvent::Approve,
        ApplicationEvent::Reject,
        ApplicationEvent::Reapply,
        ApplicationEvent::Withdraw,
    ];

    fn target(status: ApplicationStatus, event: ApplicationEvent) -> Option<ApplicationStatus> {
        use ApplicationEvent as E;
        use ApplicationStatus as S;

        match (status, event) {
            (S::Pending, E::Approve) => Some(S::Approved),
            (S::Pending, E::Reject) => Some(S::Rejected),
            (S::Rejected, E::Reapply) => Some(S::Pending),
            (S::Pending | S::Approved, E::Withdraw) => Some(S::Withdrawn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub key: ApplicationKey,
    pub status: ApplicationStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn submit(key: ApplicationKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            status: ApplicationLifecycle::INITIAL,
            version: 0,
            created_at: now,
            submitted_at: Some(now),
            approved_at: None,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lifecycle::testing::assert_terminates;

    #[test]
    fn withdraw_from_any_open_status() {
        for &status in ApplicationLifecycle::STATUSES {
            let expected = matches!(
                status,
                ApplicationStatus::Pending | ApplicationStatus::Approved
            );
            assert_eq!(
                ApplicationLifecycle::target(status, ApplicationEvent::Withdraw).is_some(),
                expected,
                "withdraw from {status}"
            );
        }
    }

    #[test]
    fn withdrawn_is_terminal() {
        assert!(ApplicationLifecycle::is_terminal(ApplicationStatus::Withdrawn));
        assert!(!ApplicationLifecycle::is_terminal(ApplicationStatus::Rejected));
        assert_terminates::<ApplicationLifecycle>();
    }
}
