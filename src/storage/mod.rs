//! Storage abstraction for workflow entities.
//!
//! Every lifecycle write goes through a conditional update: it matches on the
//! entity key *and* the version read before the transition, bumps the version
//! by exactly one, and reports how many rows it touched. Zero rows means some
//! other writer got there first. Implementations must make this a single
//! atomic statement, never read-then-write.
//!
//! Writes take a transaction handle (`&mut Self::Tx`) so a status change can
//! share a commit with other writes, such as a staged scheduled task.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::fmt::Display;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Application, ApplicationKey, ApplicationStatus, Company, CompanyDetails, CompanyId,
    EntityKind, Exhibition, ExhibitionId, ExhibitionStatus, MerchantId, Milestones, Page,
    PageRequest, Participant, ParticipantId, ParticipantStatus, Profile, ServiceProviderId,
};
use crate::error::{Result, VernissageError};

/// Local transaction boundary.
#[async_trait]
pub trait Transactional: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx>;
    async fn commit(&self, tx: Self::Tx) -> Result<()>;
    async fn rollback(&self, tx: Self::Tx) -> Result<()>;
}

/// Commit on success, roll back on error.
///
/// The original error wins over a rollback failure, which is only logged.
pub async fn finish<S, T>(storage: &S, tx: S::Tx, outcome: Result<T>) -> Result<T>
where
    S: Transactional + ?Sized,
{
    match outcome {
        Ok(value) => {
            storage.commit(tx).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = storage.rollback(tx).await {
                tracing::error!(
                    error = %rollback_err,
                    original_error = %e,
                    "Failed to roll back transaction"
                );
            }
            Err(e)
        }
    }
}

/// A conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate<K, S> {
    pub key: K,
    pub expected_version: i64,
    pub status: S,
    pub milestones: Milestones,
    pub updated_at: DateTime<Utc>,
}

impl<K, S> StatusUpdate<K, S> {
    pub fn next_version(&self) -> i64 {
        self.expected_version + 1
    }
}

/// Map a zero-row conditional write to [`VernissageError::ConcurrentModification`].
pub fn ensure_applied(
    rows_affected: u64,
    entity: EntityKind,
    key: &impl Display,
    event: &impl Display,
    expected_version: i64,
) -> Result<()> {
    if rows_affected == 0 {
        return Err(VernissageError::ConcurrentModification {
            entity,
            key: key.to_string(),
            event: event.to_string(),
            expected_version,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExhibitionFilter {
    pub title_prefix: Option<String>,
    pub status: Option<ExhibitionStatus>,
    pub organizer_id: Option<ServiceProviderId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantFilter {
    pub name_prefix: Option<String>,
    pub status: Option<ParticipantStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub exhibition_id: Option<ExhibitionId>,
    pub merchant_id: Option<MerchantId>,
    pub status: Option<ApplicationStatus>,
}

#[async_trait]
pub trait ExhibitionStorage: Transactional {
    /// Fails with [`VernissageError::Conflict`] on a duplicate title.
    async fn insert_exhibition(&self, tx: &mut Self::Tx, exhibition: &Exhibition) -> Result<()>;

    async fn get_exhibition(&self, id: ExhibitionId) -> Result<Option<Exhibition>>;

    /// Newest first.
    async fn list_exhibitions(
        &self,
        filter: &ExhibitionFilter,
        page: PageRequest,
    ) -> Result<Page<Exhibition>>;

    /// Returns rows affected: 1 when applied, 0 when the version moved on.
    async fn update_exhibition_status(
        &self,
        tx: &mut Self::Tx,
        update: &StatusUpdate<ExhibitionId, ExhibitionStatus>,
    ) -> Result<u64>;
}

#[async_trait]
pub trait CompanyStorage: Transactional {
    async fn insert_company(&self, tx: &mut Self::Tx, company: &Company) -> Result<()>;

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>>;

    /// Overwrite the registration data and bump the version.
    async fn update_company_details(
        &self,
        tx: &mut Self::Tx,
        id: CompanyId,
        details: &CompanyDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<u64>;
}

/// Storage for one participant role, selected by the id type.
#[async_trait]
pub trait ParticipantStorage<I: ParticipantId>: CompanyStorage {
    /// Fails with [`VernissageError::Conflict`] on a duplicate name.
    async fn insert_participant(
        &self,
        tx: &mut Self::Tx,
        participant: &Participant<I>,
    ) -> Result<()>;

    async fn get_participant(&self, id: I) -> Result<Option<Participant<I>>>;

    async fn list_participants(
        &self,
        filter: &ParticipantFilter,
        page: PageRequest,
    ) -> Result<Page<Participant<I>>>;

    /// Conditional status write, optionally replacing the profile in the same statement.
    async fn update_participant(
        &self,
        tx: &mut Self::Tx,
        update: &StatusUpdate<I, ParticipantStatus>,
        profile: Option<&Profile>,
    ) -> Result<u64>;
}

#[async_trait]
pub trait ApplicationStorage: Transactional {
    /// Fails with [`VernissageError::Conflict`] if the pair already has an application.
    async fn insert_application(&self, tx: &mut Self::Tx, application: &Application)
    -> Result<()>;

    async fn get_application(&self, key: ApplicationKey) -> Result<Option<Application>>;

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Page<Application>>;

    async fn update_application(
        &self,
        tx: &mut Self::Tx,
        update: &StatusUpdate<ApplicationKey, ApplicationStatus>,
    ) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_a_concurrent_modification() {
        let id = ExhibitionId::new();
        let err = ensure_applied(0, EntityKind::Exhibition, &id, &"approve", 3).unwrap_err();
        assert!(matches!(
            err,
            VernissageError::ConcurrentModification {
                expected_version: 3,
                ..
            }
        ));
        assert!(ensure_applied(1, EntityKind::Exhibition, &id, &"approve", 3).is_ok());
    }
}
