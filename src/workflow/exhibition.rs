//! Exhibition executor and its scheduled-task entry points.

use std::sync::Arc;

use chrono::Utc;

use super::coordinator::ScheduledTransitionCoordinator;
use super::{EventSource, log_rejection, not_found};
use crate::config::WorkflowConfig;
use crate::domain::lifecycle::resolve;
use crate::domain::{
    EntityKind, Exhibition, ExhibitionEvent, ExhibitionId, ExhibitionLifecycle, ExhibitionStatus,
    FiredTask, NewExhibition, NewScheduledTask, Page, PageRequest, ServiceProviderId, TaskType,
};
use crate::error::{Result, VernissageError};
use crate::metrics::record_transition;
use crate::storage::{
    ExhibitionFilter, ExhibitionStorage, ParticipantStorage, StatusUpdate, Transactional,
    ensure_applied, finish,
};
use crate::tasks::TaskManager;

pub struct ExhibitionWorkflow<S, T> {
    storage: Arc<S>,
    coordinator: ScheduledTransitionCoordinator<S, T>,
    config: WorkflowConfig,
}

impl<S, T> ExhibitionWorkflow<S, T>
where
    S: ExhibitionStorage + 'static,
    T: TaskManager<<S as Transactional>::Tx> + 'static,
{
    pub fn new(storage: Arc<S>, tasks: Arc<T>, config: WorkflowConfig) -> Self {
        Self {
            coordinator: ScheduledTransitionCoordinator::new(storage.clone(), tasks),
            storage,
            config,
        }
    }

    pub async fn get(&self, id: ExhibitionId) -> Result<Exhibition> {
        self.storage
            .get_exhibition(id)
            .await?
            .ok_or_else(|| not_found(EntityKind::Exhibition, &id))
    }

    pub async fn list(
        &self,
        filter: &ExhibitionFilter,
        page: PageRequest,
    ) -> Result<Page<Exhibition>> {
        let page = page.normalized(self.config.default_page_size, self.config.max_page_size);
        self.storage.list_exhibitions(filter, page).await
    }

    /// Exhibitions waiting for review.
    pub async fn pending(&self, page: PageRequest) -> Result<Page<Exhibition>> {
        let filter = ExhibitionFilter {
            status: Some(ExhibitionStatus::Pending),
            ..Default::default()
        };
        self.list(&filter, page).await
    }

    #[tracing::instrument(
        skip(self, source),
        fields(exhibition_id = %id, event = %event, source = source.label())
    )]
    pub async fn handle_event(
        &self,
        id: ExhibitionId,
        event: ExhibitionEvent,
        source: EventSource,
    ) -> Result<()> {
        let result = self
            .apply(id, event)
            .await
            .map_err(|e| e.during(EntityKind::Exhibition, &id.to_string(), event.as_str()));

        record_transition(EntityKind::Exhibition, event.as_str(), &result);
        if let Err(e) = &result {
            log_rejection(e);
        }
        result
    }

    async fn apply(&self, id: ExhibitionId, event: ExhibitionEvent) -> Result<()> {
        let exhibition = self.get(id).await?;
        let target = resolve::<ExhibitionLifecycle>(&id, exhibition.status, event)?;

        let now = Utc::now();
        let update = StatusUpdate {
            key: id,
            expected_version: exhibition.version,
            status: target,
            milestones: event.milestones(now),
            updated_at: now,
        };

        match event.arms() {
            Some(task_type) => {
                let fire_at = exhibition.schedule.fire_time(task_type);
                let task = NewScheduledTask::deadline(task_type, id, fire_at)?;
                self.coordinator
                    .commit_with_deadline(&update, event, task)
                    .await?;
            }
            None => {
                let mut tx = self.storage.begin().await?;
                let outcome = self.write_status(&mut tx, &update, event).await;
                finish(self.storage.as_ref(), tx, outcome).await?;
            }
        }

        tracing::info!(
            from = %exhibition.status,
            to = %target,
            version = update.next_version(),
            "Exhibition transition applied"
        );
        Ok(())
    }

    async fn write_status(
        &self,
        tx: &mut <S as Transactional>::Tx,
        update: &StatusUpdate<ExhibitionId, ExhibitionStatus>,
        event: ExhibitionEvent,
    ) -> Result<()> {
        let rows = self.storage.update_exhibition_status(tx, update).await?;
        ensure_applied(
            rows,
            EntityKind::Exhibition,
            &update.key,
            &event,
            update.expected_version,
        )
    }

    /// Registration opens.
    pub async fn handle_task_auto_start_enrolling(&self, task: FiredTask) -> Result<()> {
        self.handle_task(TaskType::AutoStartEnrolling, task).await
    }

    /// Registration closes.
    pub async fn handle_task_auto_end_enrolling(&self, task: FiredTask) -> Result<()> {
        self.handle_task(TaskType::AutoEndEnrolling, task).await
    }

    /// The exhibition opens.
    pub async fn handle_task_auto_start_running(&self, task: FiredTask) -> Result<()> {
        self.handle_task(TaskType::AutoStartRunning, task).await
    }

    /// The exhibition closes.
    pub async fn handle_task_auto_end(&self, task: FiredTask) -> Result<()> {
        self.handle_task(TaskType::AutoEnd, task).await
    }

    async fn handle_task(&self, expected: TaskType, task: FiredTask) -> Result<()> {
        if task.task_type != expected {
            return Err(VernissageError::ValidationError(format!(
                "task {} of type {} delivered to the {expected} handler",
                task.id, task.task_type
            )));
        }
        let id = task.exhibition_id()?;

        match task.payload() {
            Ok(payload) => tracing::debug!(
                task_id = %task.id,
                deadline = %payload.deadline,
                "Replaying scheduled deadline"
            ),
            Err(e) => tracing::warn!(
                task_id = %task.id,
                error = %e,
                "Scheduled task payload unreadable, replaying by id"
            ),
        }

        self.handle_event(id, expected.event(), EventSource::Scheduled(task))
            .await
    }
}

impl<S, T> ExhibitionWorkflow<S, T>
where
    S: ExhibitionStorage + ParticipantStorage<ServiceProviderId> + 'static,
    T: TaskManager<<S as Transactional>::Tx> + 'static,
{
    /// Validate the schedule and organizer, then store a new exhibition in `Preparing`.
    #[tracing::instrument(skip(self, input), fields(title = %input.details.title))]
    pub async fn create(&self, input: NewExhibition) -> Result<Exhibition> {
        if input.details.title.trim().is_empty() {
            return Err(VernissageError::ValidationError(
                "exhibition title must not be empty".into(),
            ));
        }
        if let Some(organizer_id) = input.organizer_id {
            self.ensure_organizer_available(organizer_id).await?;
        }

        let now = Utc::now();
        input
            .schedule
            .validate(now, self.config.registration_start_tolerance())?;

        let exhibition = Exhibition::create(input, now);
        let mut tx = self.storage.begin().await?;
        let outcome = self.storage.insert_exhibition(&mut tx, &exhibition).await;
        finish(self.storage.as_ref(), tx, outcome).await?;

        tracing::info!(exhibition_id = %exhibition.id, "Exhibition created");
        Ok(exhibition)
    }

    /// Only an approved service provider may organise an exhibition.
    async fn ensure_organizer_available(&self, organizer_id: ServiceProviderId) -> Result<()> {
        let organizer = self
            .storage
            .get_participant(organizer_id)
            .await?
            .ok_or_else(|| not_found(EntityKind::ServiceProvider, &organizer_id))?;
        if !organizer.is_available() {
            return Err(VernissageError::ValidationError(format!(
                "organizer {organizer_id} is not approved (status {})",
                organizer.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::{
        CompanyId, ExhibitionDetails, ExhibitionSchedule, ParticipantStatus, Profile,
        ServiceProvider,
    };
    use crate::storage::memory::{InMemoryStorage, InMemoryTaskQueue};

    type Workflow = ExhibitionWorkflow<InMemoryStorage, InMemoryTaskQueue>;

    fn setup() -> (Workflow, InMemoryTaskQueue) {
        let storage = Arc::new(InMemoryStorage::new());
        let queue = InMemoryTaskQueue::new(&storage);
        let workflow = ExhibitionWorkflow::new(
            storage,
            Arc::new(queue.clone()),
            WorkflowConfig::default(),
        );
        (workflow, queue)
    }

    fn input(title: &str) -> NewExhibition {
        let now = Utc::now();
        NewExhibition {
            organizer_id: None,
            details: ExhibitionDetails {
                title: title.into(),
                city: "Lyon".into(),
                ..Default::default()
            },
            schedule: ExhibitionSchedule {
                registration_start: now + Duration::days(1),
                registration_end: now + Duration::days(5),
                start_time: now + Duration::days(6),
                end_time: now + Duration::days(8),
            },
        }
    }

    #[tokio::test]
    async fn created_exhibitions_start_preparing() {
        let (workflow, _) = setup();
        let created = workflow.create(input("Salon du Meuble")).await.unwrap();

        let stored = workflow.get(created.id).await.unwrap();
        assert_eq!(stored.status, ExhibitionStatus::Preparing);
        assert_eq!(stored.version, 0);
        assert!(stored.submitted_at.is_none());
    }

    #[tokio::test]
    async fn create_rejects_bad_schedule_and_duplicates() {
        let (workflow, _) = setup();

        let mut bad = input("Backwards");
        bad.schedule.end_time = bad.schedule.start_time - Duration::hours(1);
        assert!(matches!(
            workflow.create(bad).await,
            Err(VernissageError::ValidationError(_))
        ));

        workflow.create(input("Twice")).await.unwrap();
        assert!(matches!(
            workflow.create(input("Twice")).await,
            Err(VernissageError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn organizer_must_exist_and_be_approved() {
        let storage = Arc::new(InMemoryStorage::new());
        let queue = InMemoryTaskQueue::new(&storage);
        let workflow =
            ExhibitionWorkflow::new(storage.clone(), Arc::new(queue), WorkflowConfig::default());

        let mut organizer = ServiceProvider::register(
            CompanyId::new(),
            Profile {
                name: "Expo Services".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        let organizer_id = organizer.id;
        storage.seed_participant(organizer.clone()).await;

        let mut pending = input("Pending Organizer");
        pending.organizer_id = Some(organizer_id);
        assert!(matches!(
            workflow.create(pending).await,
            Err(VernissageError::ValidationError(_))
        ));

        let mut unknown = input("Unknown Organizer");
        unknown.organizer_id = Some(ServiceProviderId::new());
        assert!(matches!(
            workflow.create(unknown).await,
            Err(VernissageError::NotFound {
                entity: EntityKind::ServiceProvider,
                ..
            })
        ));

        organizer.status = ParticipantStatus::Approved;
        storage.seed_participant(organizer).await;
        let mut approved = input("Approved Organizer");
        approved.organizer_id = Some(organizer_id);
        let created = workflow.create(approved).await.unwrap();
        assert_eq!(created.organizer_id, Some(organizer_id));

        let page = workflow
            .list(&ExhibitionFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn submit_then_reject_clears_submission_time() {
        let (workflow, queue) = setup();
        let e = workflow.create(input("Round Trip")).await.unwrap();

        workflow
            .handle_event(e.id, ExhibitionEvent::Submit, EventSource::Administrative)
            .await
            .unwrap();
        assert!(workflow.get(e.id).await.unwrap().submitted_at.is_some());

        workflow
            .handle_event(e.id, ExhibitionEvent::Reject, EventSource::Administrative)
            .await
            .unwrap();
        let rejected = workflow.get(e.id).await.unwrap();
        assert_eq!(rejected.status, ExhibitionStatus::Preparing);
        assert_eq!(rejected.version, 2);
        assert!(rejected.submitted_at.is_none());
        assert!(queue.armed_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn approve_arms_registration_start_and_wakes_up() {
        let (workflow, queue) = setup();
        let e = workflow.create(input("Armed")).await.unwrap();

        for event in [ExhibitionEvent::Submit, ExhibitionEvent::Approve] {
            workflow
                .handle_event(e.id, event, EventSource::Administrative)
                .await
                .unwrap();
        }

        let armed = queue.armed_tasks().await;
        assert_eq!(armed.len(), 1);
        assert_eq!(armed[0].task_type, TaskType::AutoStartEnrolling);
        assert_eq!(armed[0].custom_id, e.id.to_string());
        assert_eq!(armed[0].fire_at, e.schedule.registration_start);
        assert_eq!(queue.wakeups(), vec![TaskType::AutoStartEnrolling]);

        let approved = workflow.get(e.id).await.unwrap();
        assert_eq!(approved.status, ExhibitionStatus::Approved);
        assert!(approved.approved_at.is_some());
    }

    #[tokio::test]
    async fn mismatched_task_type_is_refused() {
        let (workflow, _) = setup();
        let e = workflow.create(input("Mismatch")).await.unwrap();
        let task = FiredTask {
            id: uuid::Uuid::new_v4(),
            task_type: TaskType::AutoEnd,
            custom_id: e.id.to_string(),
            payload: Vec::new(),
            fire_at: Utc::now(),
        };

        let err = workflow
            .handle_task_auto_start_running(task)
            .await
            .unwrap_err();
        assert!(matches!(err, VernissageError::ValidationError(_)));
        assert_eq!(workflow.get(e.id).await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn unknown_exhibition_is_not_found() {
        let (workflow, _) = setup();
        let err = workflow
            .handle_event(
                ExhibitionId::new(),
                ExhibitionEvent::Submit,
                EventSource::Administrative,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VernissageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn pending_lists_only_submitted() {
        let (workflow, _) = setup();
        let a = workflow.create(input("A")).await.unwrap();
        workflow.create(input("B")).await.unwrap();
        workflow
            .handle_event(a.id, ExhibitionEvent::Submit, EventSource::Administrative)
            .await
            .unwrap();

        let page = workflow.pending(PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.items[0].id, a.id);
    }
}
