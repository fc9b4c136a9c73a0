//! Exhibition applications, keyed by `(exhibition_id, merchant_id)`.

use std::sync::Arc;

use chrono::Utc;

use super::{EventSource, log_rejection, not_found};
use crate::config::WorkflowConfig;
use crate::domain::lifecycle::resolve;
use crate::domain::{
    Application, ApplicationEvent, ApplicationKey, ApplicationLifecycle, ApplicationStatus,
    EntityKind, ExhibitionId, ExhibitionStatus, MerchantId, Page, PageRequest,
};
use crate::error::{Result, VernissageError};
use crate::metrics::record_transition;
use crate::storage::{
    ApplicationFilter, ApplicationStorage, ExhibitionStorage, ParticipantStorage, StatusUpdate,
    Transactional, ensure_applied, finish,
};

pub struct ApplicationWorkflow<S> {
    storage: Arc<S>,
    config: WorkflowConfig,
}

impl<S> ApplicationWorkflow<S>
where
    S: ApplicationStorage + ExhibitionStorage + ParticipantStorage<MerchantId> + 'static,
{
    pub fn new(storage: Arc<S>, config: WorkflowConfig) -> Self {
        Self { storage, config }
    }

    /// Apply to exhibit.
    ///
    /// The exhibition must be enrolling and the merchant approved. A rejected
    /// application is sent back to review through `reapply`; an open or
    /// withdrawn one is a conflict.
    #[tracing::instrument(
        skip(self),
        fields(exhibition_id = %exhibition_id, merchant_id = %merchant_id)
    )]
    pub async fn apply(
        &self,
        exhibition_id: ExhibitionId,
        merchant_id: MerchantId,
    ) -> Result<Application> {
        let exhibition = self
            .storage
            .get_exhibition(exhibition_id)
            .await?
            .ok_or_else(|| not_found(EntityKind::Exhibition, &exhibition_id))?;
        if exhibition.status != ExhibitionStatus::Enrolling {
            return Err(VernissageError::ValidationError(format!(
                "exhibition {exhibition_id} is not accepting applications (status {})",
                exhibition.status
            )));
        }

        let merchant = self
            .storage
            .get_participant(merchant_id)
            .await?
            .ok_or_else(|| not_found(EntityKind::Merchant, &merchant_id))?;
        if !merchant.is_available() {
            return Err(VernissageError::ValidationError(format!(
                "merchant {merchant_id} is not approved (status {})",
                merchant.status
            )));
        }

        let key = ApplicationKey::new(exhibition_id, merchant_id);
        match self.storage.get_application(key).await? {
            Some(existing) if existing.status == ApplicationStatus::Rejected => {
                self.handle_event(key, ApplicationEvent::Reapply, EventSource::Administrative)
                    .await?;
                self.get(key).await
            }
            Some(existing) => Err(VernissageError::Conflict {
                entity: EntityKind::Application,
                constraint: format!("application already {}", existing.status),
            }),
            None => {
                let application = Application::submit(key, Utc::now());
                let mut tx = self.storage.begin().await?;
                let outcome = self.storage.insert_application(&mut tx, &application).await;
                finish(self.storage.as_ref(), tx, outcome).await?;

                tracing::info!("Application submitted");
                Ok(application)
            }
        }
    }

    pub async fn get(&self, key: ApplicationKey) -> Result<Application> {
        self.storage
            .get_application(key)
            .await?
            .ok_or_else(|| not_found(EntityKind::Application, &key))
    }

    pub async fn list(
        &self,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Page<Application>> {
        let page = page.normalized(self.config.default_page_size, self.config.max_page_size);
        self.storage.list_applications(filter, page).await
    }

    /// Applications to one exhibition awaiting review.
    pub async fn pending_for_exhibition(
        &self,
        exhibition_id: ExhibitionId,
        page: PageRequest,
    ) -> Result<Page<Application>> {
        let filter = ApplicationFilter {
            exhibition_id: Some(exhibition_id),
            status: Some(ApplicationStatus::Pending),
            ..Default::default()
        };
        self.list(&filter, page).await
    }

    #[tracing::instrument(
        skip(self, source),
        fields(application = %key, event = %event, source = source.label())
    )]
    pub async fn handle_event(
        &self,
        key: ApplicationKey,
        event: ApplicationEvent,
        source: EventSource,
    ) -> Result<()> {
        let result = self
            .transition(key, event)
            .await
            .map_err(|e| e.during(EntityKind::Application, &key.to_string(), event.as_str()));

        record_transition(EntityKind::Application, event.as_str(), &result);
        if let Err(e) = &result {
            log_rejection(e);
        }
        result
    }

    async fn transition(&self, key: ApplicationKey, event: ApplicationEvent) -> Result<()> {
        let current = self.get(key).await?;
        let target = resolve::<ApplicationLifecycle>(&key, current.status, event)?;

        let now = Utc::now();
        let update = StatusUpdate {
            key,
            expected_version: current.version,
            status: target,
            milestones: event.milestones(now),
            updated_at: now,
        };

        let mut tx = self.storage.begin().await?;
        let outcome = self.write_status(&mut tx, &update, event).await;
        finish(self.storage.as_ref(), tx, outcome).await?;

        tracing::info!(
            from = %current.status,
            to = %target,
            version = update.next_version(),
            "Application transition applied"
        );
        Ok(())
    }

    async fn write_status(
        &self,
        tx: &mut <S as Transactional>::Tx,
        update: &StatusUpdate<ApplicationKey, ApplicationStatus>,
        event: ApplicationEvent,
    ) -> Result<()> {
        let rows = self.storage.update_application(tx, update).await?;
        ensure_applied(
            rows,
            EntityKind::Application,
            &update.key,
            &event,
            update.expected_version,
        )
    }
}
