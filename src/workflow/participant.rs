//! Merchant and service-provider executor.
//!
//! One implementation serves both roles. The id type picks the table,
//! the entity label and the company kind.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;

use super::{EventSource, log_rejection, not_found};
use crate::config::WorkflowConfig;
use crate::domain::lifecycle::resolve;
use crate::domain::{
    Company, EntityKind, MerchantId, Page, PageRequest, Participant, ParticipantEvent,
    ParticipantId, ParticipantLifecycle, ParticipantStatus, Registration, ServiceProviderId,
};
use crate::error::{Result, VernissageError};
use crate::metrics::record_transition;
use crate::storage::{
    ParticipantFilter, ParticipantStorage, StatusUpdate, Transactional, ensure_applied, finish,
};

pub struct ParticipantWorkflow<I, S> {
    storage: Arc<S>,
    config: WorkflowConfig,
    _role: PhantomData<fn() -> I>,
}

pub type MerchantWorkflow<S> = ParticipantWorkflow<MerchantId, S>;
pub type ServiceProviderWorkflow<S> = ParticipantWorkflow<ServiceProviderId, S>;

impl<I, S> ParticipantWorkflow<I, S>
where
    I: ParticipantId,
    S: ParticipantStorage<I> + 'static,
{
    pub fn new(storage: Arc<S>, config: WorkflowConfig) -> Self {
        Self {
            storage,
            config,
            _role: PhantomData,
        }
    }

    /// Store the company and the participant together; the participant
    /// starts `Pending` review.
    #[tracing::instrument(
        skip(self, registration),
        fields(entity = %I::ENTITY, name = %registration.profile.name)
    )]
    pub async fn register(&self, registration: Registration) -> Result<Participant<I>> {
        if registration.profile.name.trim().is_empty() {
            return Err(VernissageError::ValidationError(format!(
                "{} name must not be empty",
                I::ENTITY
            )));
        }
        if registration.company.name.trim().is_empty() {
            return Err(VernissageError::ValidationError(
                "company name must not be empty".into(),
            ));
        }

        let now = Utc::now();
        let company = Company::create(I::COMPANY_KIND, registration.company, now);
        let participant = Participant::<I>::register(company.id, registration.profile, now);

        let mut tx = self.storage.begin().await?;
        let outcome = async {
            self.storage.insert_company(&mut tx, &company).await?;
            self.storage.insert_participant(&mut tx, &participant).await
        }
        .await;
        finish(self.storage.as_ref(), tx, outcome).await?;

        tracing::info!(
            participant_id = %participant.id,
            company_id = %company.id,
            "Participant registered"
        );
        Ok(participant)
    }

    pub async fn get(&self, id: I) -> Result<Participant<I>> {
        self.storage
            .get_participant(id)
            .await?
            .ok_or_else(|| not_found(I::ENTITY, &id))
    }

    pub async fn company(&self, id: I) -> Result<Company> {
        let participant = self.get(id).await?;
        self.storage
            .get_company(participant.company_id)
            .await?
            .ok_or_else(|| not_found(EntityKind::Company, &participant.company_id))
    }

    pub async fn list(
        &self,
        filter: &ParticipantFilter,
        page: PageRequest,
    ) -> Result<Page<Participant<I>>> {
        let page = page.normalized(self.config.default_page_size, self.config.max_page_size);
        self.storage.list_participants(filter, page).await
    }

    /// Participants waiting for review.
    pub async fn pending(&self, page: PageRequest) -> Result<Page<Participant<I>>> {
        let filter = ParticipantFilter {
            status: Some(ParticipantStatus::Pending),
            ..Default::default()
        };
        self.list(&filter, page).await
    }

    /// Only approved participants may take part in exhibitions.
    pub async fn is_available(&self, id: I) -> Result<bool> {
        Ok(self.get(id).await?.is_available())
    }

    #[tracing::instrument(
        skip(self, event, source),
        fields(
            entity = %I::ENTITY,
            participant_id = %id,
            event = %event.kind(),
            source = source.label()
        )
    )]
    pub async fn handle_event(
        &self,
        id: I,
        event: ParticipantEvent,
        source: EventSource,
    ) -> Result<()> {
        let kind = event.kind();
        let result = self
            .apply(id, &event)
            .await
            .map_err(|e| e.during(I::ENTITY, &id.to_string(), kind.as_str()));

        record_transition(I::ENTITY, kind.as_str(), &result);
        if let Err(e) = &result {
            log_rejection(e);
        }
        result
    }

    async fn apply(&self, id: I, event: &ParticipantEvent) -> Result<()> {
        let current = self.get(id).await?;
        let target = resolve::<ParticipantLifecycle<I>>(&id, current.status, event.kind())?;

        let now = Utc::now();
        let update = StatusUpdate {
            key: id,
            expected_version: current.version,
            status: target,
            milestones: event.milestones(now),
            updated_at: now,
        };

        let mut tx = self.storage.begin().await?;
        let outcome = self.write(&mut tx, &current, &update, event).await;
        finish(self.storage.as_ref(), tx, outcome).await?;

        tracing::info!(
            from = %current.status,
            to = %target,
            version = update.next_version(),
            "Participant transition applied"
        );
        Ok(())
    }

    async fn write(
        &self,
        tx: &mut <S as Transactional>::Tx,
        current: &Participant<I>,
        update: &StatusUpdate<I, ParticipantStatus>,
        event: &ParticipantEvent,
    ) -> Result<()> {
        let resubmission = match event {
            ParticipantEvent::Recommit(resubmission) => Some(resubmission),
            _ => None,
        };

        let rows = self
            .storage
            .update_participant(tx, update, resubmission.map(|r| &r.profile))
            .await?;
        ensure_applied(
            rows,
            I::ENTITY,
            &update.key,
            &event.kind(),
            update.expected_version,
        )?;

        if let Some(resubmission) = resubmission {
            let rows = self
                .storage
                .update_company_details(
                    tx,
                    current.company_id,
                    &resubmission.company,
                    update.updated_at,
                )
                .await?;
            if rows == 0 {
                return Err(not_found(EntityKind::Company, &current.company_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompanyDetails, CompanyKind, Profile, Resubmission};
    use crate::storage::memory::InMemoryStorage;

    fn registration(name: &str) -> Registration {
        Registration {
            company: CompanyDetails {
                name: format!("{name} SARL"),
                country: "FR".into(),
                ..Default::default()
            },
            profile: Profile {
                name: name.into(),
                contact_person_email: "desk@example.org".into(),
                ..Default::default()
            },
        }
    }

    fn merchants() -> MerchantWorkflow<InMemoryStorage> {
        ParticipantWorkflow::new(Arc::new(InMemoryStorage::new()), WorkflowConfig::default())
    }

    #[tokio::test]
    async fn register_creates_company_of_matching_kind() {
        let workflow = merchants();
        let merchant = workflow.register(registration("Atelier")).await.unwrap();

        let company = workflow.company(merchant.id).await.unwrap();
        assert_eq!(company.kind, CompanyKind::Merchant);
        assert_eq!(company.id, merchant.company_id);
        assert_eq!(merchant.status, ParticipantStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_names_conflict_and_leave_no_orphan_company() {
        let workflow = merchants();
        workflow.register(registration("Twin")).await.unwrap();
        let err = workflow.register(registration("Twin")).await.unwrap_err();
        assert!(matches!(
            err,
            VernissageError::Conflict {
                entity: EntityKind::Merchant,
                ..
            }
        ));

        let all = workflow
            .list(&ParticipantFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 1);
    }

    #[tokio::test]
    async fn recommit_rewrites_profile_and_company() {
        let workflow = merchants();
        let merchant = workflow.register(registration("Draft")).await.unwrap();
        workflow
            .handle_event(merchant.id, ParticipantEvent::Reject, EventSource::Administrative)
            .await
            .unwrap();
        assert!(workflow.get(merchant.id).await.unwrap().submitted_at.is_none());

        let corrected = registration("Corrected");
        workflow
            .handle_event(
                merchant.id,
                ParticipantEvent::Recommit(Resubmission {
                    profile: corrected.profile.clone(),
                    company: corrected.company.clone(),
                }),
                EventSource::Administrative,
            )
            .await
            .unwrap();

        let stored = workflow.get(merchant.id).await.unwrap();
        assert_eq!(stored.status, ParticipantStatus::Pending);
        assert_eq!(stored.profile.name, "Corrected");
        assert_eq!(stored.version, 2);
        let company = workflow.company(merchant.id).await.unwrap();
        assert_eq!(company.details.name, "Corrected SARL");
        assert_eq!(company.version, 1);
    }

    #[tokio::test]
    async fn recommit_cannot_take_another_participants_name() {
        let workflow = merchants();
        workflow.register(registration("Alpha")).await.unwrap();
        let beta = workflow.register(registration("Beta")).await.unwrap();
        workflow
            .handle_event(beta.id, ParticipantEvent::Reject, EventSource::Administrative)
            .await
            .unwrap();

        let taken = registration("Alpha");
        let err = workflow
            .handle_event(
                beta.id,
                ParticipantEvent::Recommit(Resubmission {
                    profile: taken.profile,
                    company: taken.company,
                }),
                EventSource::Administrative,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VernissageError::Conflict {
                entity: EntityKind::Merchant,
                ..
            }
        ));

        let stored = workflow.get(beta.id).await.unwrap();
        assert_eq!(stored.status, ParticipantStatus::Rejected);
        assert_eq!(stored.profile.name, "Beta");
        let named_alpha = workflow
            .list(
                &ParticipantFilter {
                    name_prefix: Some("Alpha".into()),
                    ..Default::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(named_alpha.total, 1);
    }

    #[tokio::test]
    async fn disable_and_enable_toggle_availability() {
        let workflow: ServiceProviderWorkflow<InMemoryStorage> =
            ParticipantWorkflow::new(Arc::new(InMemoryStorage::new()), WorkflowConfig::default());
        let sp = workflow.register(registration("Organiser")).await.unwrap();

        workflow
            .handle_event(sp.id, ParticipantEvent::Approve, EventSource::Administrative)
            .await
            .unwrap();
        assert!(workflow.is_available(sp.id).await.unwrap());
        assert!(workflow.get(sp.id).await.unwrap().approved_at.is_some());

        workflow
            .handle_event(sp.id, ParticipantEvent::Disable, EventSource::Administrative)
            .await
            .unwrap();
        assert!(!workflow.is_available(sp.id).await.unwrap());

        workflow
            .handle_event(sp.id, ParticipantEvent::Enable, EventSource::Administrative)
            .await
            .unwrap();
        assert!(workflow.is_available(sp.id).await.unwrap());
        assert_eq!(
            workflow.company(sp.id).await.unwrap().kind,
            CompanyKind::ServiceProvider
        );
    }

    #[tokio::test]
    async fn unregistered_accepts_nothing() {
        let workflow = merchants();
        let m = workflow.register(registration("Leaving")).await.unwrap();
        for event in [ParticipantEvent::Approve, ParticipantEvent::Unregister] {
            workflow
                .handle_event(m.id, event, EventSource::Administrative)
                .await
                .unwrap();
        }

        let err = workflow
            .handle_event(m.id, ParticipantEvent::Enable, EventSource::Administrative)
            .await
            .unwrap_err();
        assert!(matches!(err, VernissageError::IllegalTransition { .. }));
        assert_eq!(workflow.get(m.id).await.unwrap().version, 2);
    }
}
