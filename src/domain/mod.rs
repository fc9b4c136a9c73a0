//! Core domain types for exhibition workflows.
//!
//! Pure data with no persistence dependencies:
//! - Identifier newtypes
//! - Per-entity statuses, events and transition tables
//! - Scheduled task descriptors exchanged with the task manager
//! - Pagination

pub mod application;
pub mod company;
pub mod exhibition;
pub mod ids;
pub mod lifecycle;
pub mod page;
pub mod participant;
pub mod task;

use serde::{Deserialize, Serialize};

pub use application::{Application, ApplicationEvent, ApplicationLifecycle, ApplicationStatus};
pub use company::{Company, CompanyDetails, CompanyKind};
pub use exhibition::{
    Exhibition, ExhibitionDetails, ExhibitionEvent, ExhibitionLifecycle, ExhibitionSchedule,
    ExhibitionStatus, NewExhibition,
};
pub use ids::{ApplicationKey, CompanyId, ExhibitionId, MerchantId, ServiceProviderId};
pub use lifecycle::{Lifecycle, Milestone, Milestones};
pub use page::{Page, PageRequest};
pub use participant::{
    Merchant, MerchantLifecycle, Participant, ParticipantEvent, ParticipantEventKind,
    ParticipantId, ParticipantLifecycle, ParticipantStatus, Profile, Registration, Resubmission,
    ServiceProvider, ServiceProviderLifecycle,
};
pub use task::{DeadlinePayload, FiredTask, NewScheduledTask, TaskType};

/// The kinds of record this crate manages, used to label errors, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Exhibition,
    Merchant,
    ServiceProvider,
    Application,
    Company,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Exhibition => "exhibition",
            EntityKind::Merchant => "merchant",
            EntityKind::ServiceProvider => "service_provider",
            EntityKind::Application => "application",
            EntityKind::Company => "company",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
