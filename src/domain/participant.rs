//! Merchants and service providers.
//!
//! Both register through a company and share one review lifecycle:
//!
//! ```text
//! Pending ──approve──> Approved ──disable──> Disabled
//!   │   ^                 │  ^                  │
//! reject└──recommit──┐    │  └──────enable──────┘
//!   v                │    └──unregister──> Unregistered
//! Rejected ──────────┘
//! ```
//!
//! The role is carried by the id type: [`Participant<MerchantId>`] is a
//! merchant, [`Participant<ServiceProviderId>`] a service provider.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityKind;
use super::company::{CompanyDetails, CompanyKind};
use super::ids::{CompanyId, MerchantId, ServiceProviderId};
use super::lifecycle::{Lifecycle, Milestones};

/// Identifier of a registered participant; selects its role.
pub trait ParticipantId:
    Copy + Eq + Hash + Ord + Debug + Display + Send + Sync + 'static
{
    const ENTITY: EntityKind;
    const COMPANY_KIND: CompanyKind;

    fn generate() -> Self;
    fn from_uuid(uuid: Uuid) -> Self;
    fn as_uuid(&self) -> Uuid;
}

impl ParticipantId for MerchantId {
    const ENTITY: EntityKind = EntityKind::Merchant;
    const COMPANY_KIND: CompanyKind = CompanyKind::Merchant;

    fn generate() -> Self {
        MerchantId::new()
    }

    fn from_uuid(uuid: Uuid) -> Self {
        MerchantId(uuid)
    }

    fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl ParticipantId for ServiceProviderId {
    const ENTITY: EntityKind = EntityKind::ServiceProvider;
    const COMPANY_KIND: CompanyKind = CompanyKind::ServiceProvider;

    fn generate() -> Self {
        ServiceProviderId::new()
    }

    fn from_uuid(uuid: Uuid) -> Self {
        ServiceProviderId(uuid)
    }

    fn as_uuid(&self) -> Uuid {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "text", rename_all = "snake_case")
)]
pub enum ParticipantStatus {
    Pending,
    Approved,
    Rejected,
    Disabled,
    Unregistered,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Approved => "approved",
            ParticipantStatus::Rejected => "rejected",
            ParticipantStatus::Disabled => "disabled",
            ParticipantStatus::Unregistered => "unregistered",
        }
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Table key for participant events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantEventKind {
    Approve,
    Reject,
    Recommit,
    Disable,
    Enable,
    Unregister,
}

impl ParticipantEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantEventKind::Approve => "approve",
            ParticipantEventKind::Reject => "reject",
            ParticipantEventKind::Recommit => "recommit",
            ParticipantEventKind::Disable => "disable",
            ParticipantEventKind::Enable => "enable",
            ParticipantEventKind::Unregister => "unregister",
        }
    }
}

impl std::fmt::Display for ParticipantEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public profile shown to organisers and visitors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub description: String,
    pub website: String,
    pub contact_person_name: String,
    pub contact_person_phone: String,
    pub contact_person_email: String,
}

/// Corrected registration data sent back for review after a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resubmission {
    pub profile: Profile,
    pub company: CompanyDetails,
}

/// Input for registering a new participant together with its company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub company: CompanyDetails,
    pub profile: Profile,
}

/// A participant event with whatever data it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantEvent {
    Approve,
    Reject,
    Recommit(Resubmission),
    Disable,
    Enable,
    Unregister,
}

impl ParticipantEvent {
    pub fn kind(&self) -> ParticipantEventKind {
        match self {
            ParticipantEvent::Approve => ParticipantEventKind::Approve,
            ParticipantEvent::Reject => ParticipantEventKind::Reject,
            ParticipantEvent::Recommit(_) => ParticipantEventKind::Recommit,
            ParticipantEvent::Disable => ParticipantEventKind::Disable,
            ParticipantEvent::Enable => ParticipantEventKind::Enable,
            ParticipantEvent::Unregister => ParticipantEventKind::Unregister,
        }
    }

    pub fn milestones(&self, now: DateTime<Utc>) -> Milestones {
        match self {
            ParticipantEvent::Approve => Milestones::approved(now),
            ParticipantEvent::Reject => Milestones::review_closed(),
            ParticipantEvent::Recommit(_) => Milestones::submitted(now),
            _ => Milestones::keep(),
        }
    }
}

pub struct ParticipantLifecycle<I>(PhantomData<I>);

pub type MerchantLifecycle = ParticipantLifecycle<MerchantId>;
pub type ServiceProviderLifecycle = ParticipantLifecycle<ServiceProviderId>;

impl<I: ParticipantId> Lifecycle for ParticipantLifecycle<I> {
    type Status = ParticipantStatus;
    type Event = ParticipantEventKind;

    const ENTITY: EntityKind = I::ENTITY;
    const INITIAL: ParticipantStatus = ParticipantStatus::Pending;
    const STATUSES: &'static [ParticipantStatus] = &[
        ParticipantStatus::Pending,
        ParticipantStatus::Approved,
        ParticipantStatus::Rejected,
        ParticipantStatus::Disabled,
        ParticipantStatus::Unregistered,
    ];
    const EVENTS: &'static [ParticipantEventKind] = &[
        ParticipantEventKind::Approve,
        ParticipantEventKind::Reject,
        ParticipantEventKind::Recommit,
        ParticipantEventKind::Disable,
        ParticipantEventKind::Enable,
        ParticipantEventKind::Unregister,
    ];

    fn target(
        status: ParticipantStatus,
        event: ParticipantEventKind,
    ) -> Option<ParticipantStatus> {
        use ParticipantEventKind as E;
        use ParticipantStatus as S;

        match (status, event) {
            (S::Pending, E::Approve) => Some(S::Approved),
            (S::Pending, E::Reject) => Some(S::Rejected),
            (S::Rejected, E::Recommit) => Some(S::Pending),
            (S::Approved, E::Disable) => Some(S::Disabled),
            (S::Disabled, E::Enable) => Some(S::Approved),
            (S::Approved, E::Unregister) => Some(S::Unregistered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant<I> {
    pub id: I,
    pub company_id: CompanyId,
    pub profile: Profile,
    pub status: ParticipantStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

pub type Merchant = Participant<MerchantId>;
pub type ServiceProvider = Participant<ServiceProviderId>;

impl<I: ParticipantId> Participant<I> {
    /// A freshly registered participant, already submitted for review.
    pub fn register(company_id: CompanyId, profile: Profile, now: DateTime<Utc>) -> Self {
        Self {
            id: I::generate(),
            company_id,
            profile,
            status: ParticipantStatus::Pending,
            version: 0,
            created_at: now,
            submitted_at: Some(now),
            approved_at: None,
            updated_at: now,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ParticipantStatus::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::lifecycle::testing::assert_terminates;

    #[test]
    fn both_roles_terminate() {
        assert_terminates::<MerchantLifecycle>();
        assert_terminates::<ServiceProviderLifecycle>();
    }

    #[test]
    fn rejection_loops_back_through_recommit() {
        let rejected =
            MerchantLifecycle::target(ParticipantStatus::Pending, ParticipantEventKind::Reject);
        assert_eq!(rejected, Some(ParticipantStatus::Rejected));
        assert_eq!(
            MerchantLifecycle::target(ParticipantStatus::Rejected, ParticipantEventKind::Recommit),
            Some(ParticipantStatus::Pending)
        );
    }

    #[test]
    fn unregistered_is_the_only_terminal_status() {
        let terminal: Vec<_> = MerchantLifecycle::STATUSES
            .iter()
            .copied()
            .filter(|&s| MerchantLifecycle::is_terminal(s))
            .collect();
        assert_eq!(terminal, vec![ParticipantStatus::Unregistered]);
    }

    #[test]
    fn role_comes_from_the_id_type() {
        assert_eq!(
            <ServiceProviderLifecycle as Lifecycle>::ENTITY,
            EntityKind::ServiceProvider
        );
        assert_eq!(<MerchantLifecycle as Lifecycle>::ENTITY, EntityKind::Merchant);
    }

    #[test]
    fn registration_starts_in_review() {
        let now = Utc::now();
        let merchant = Merchant::register(CompanyId::new(), Profile::default(), now);
        assert_eq!(merchant.status, ParticipantStatus::Pending);
        assert_eq!(merchant.submitted_at, Some(now));
        assert!(!merchant.is_available());
    }
}
