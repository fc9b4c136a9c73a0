//! In-process storage and task queue.
//!
//! A transaction takes the table lock for its whole lifetime and works on a
//! staged copy that replaces the live tables on commit. Dropping or rolling
//! back a transaction discards the copy. Reads outside a transaction wait for
//! any open transaction to finish, so do not read through the storage while
//! holding a [`MemoryTx`] on the same task.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    ApplicationFilter, ApplicationStorage, CompanyStorage, ExhibitionFilter, ExhibitionStorage,
    ParticipantFilter, ParticipantStorage, StatusUpdate, Transactional,
};
use crate::daemon::DueTaskSource;
use crate::domain::{
    Application, ApplicationKey, ApplicationStatus, Company, CompanyDetails, CompanyId,
    EntityKind, Exhibition, ExhibitionId, ExhibitionStatus, FiredTask, Merchant, MerchantId,
    NewScheduledTask, Page, PageRequest, Participant, ParticipantId, ParticipantStatus, Profile,
    ServiceProvider, ServiceProviderId, TaskType,
};
use crate::error::{Result, VernissageError};
use crate::tasks::TaskManager;

/// Live table contents.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    companies: HashMap<CompanyId, Company>,
    merchants: HashMap<MerchantId, Merchant>,
    service_providers: HashMap<ServiceProviderId, ServiceProvider>,
    exhibitions: HashMap<ExhibitionId, Exhibition>,
    applications: HashMap<ApplicationKey, Application>,
    tasks: Vec<FiredTask>,
}

/// Selects the participant table for a role.
pub trait ParticipantTable: ParticipantId {
    fn table(tables: &Tables) -> &HashMap<Self, Participant<Self>>;
    fn table_mut(tables: &mut Tables) -> &mut HashMap<Self, Participant<Self>>;
}

impl ParticipantTable for MerchantId {
    fn table(tables: &Tables) -> &HashMap<Self, Participant<Self>> {
        &tables.merchants
    }

    fn table_mut(tables: &mut Tables) -> &mut HashMap<Self, Participant<Self>> {
        &mut tables.merchants
    }
}

impl ParticipantTable for ServiceProviderId {
    fn table(tables: &Tables) -> &HashMap<Self, Participant<Self>> {
        &tables.service_providers
    }

    fn table_mut(tables: &mut Tables) -> &mut HashMap<Self, Participant<Self>> {
        &mut tables.service_providers
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an exhibition as-is, bypassing validation. Intended for fixtures.
    pub async fn seed_exhibition(&self, exhibition: Exhibition) {
        self.tables
            .lock()
            .await
            .exhibitions
            .insert(exhibition.id, exhibition);
    }

    /// Store a participant as-is, bypassing validation. Intended for fixtures.
    pub async fn seed_participant<I: ParticipantTable>(&self, participant: Participant<I>) {
        let mut tables = self.tables.lock().await;
        I::table_mut(&mut tables).insert(participant.id, participant);
    }

    /// Store an application as-is. Intended for fixtures.
    pub async fn seed_application(&self, application: Application) {
        self.tables
            .lock()
            .await
            .applications
            .insert(application.key, application);
    }
}

fn paginate<T>(
    mut rows: Vec<T>,
    page: PageRequest,
    created_at: impl Fn(&T) -> DateTime<Utc>,
) -> Page<T> {
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    Page {
        items,
        total,
        page: page.page,
    }
}

fn conflict(entity: EntityKind, constraint: &str) -> VernissageError {
    VernissageError::Conflict {
        entity,
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl Transactional for InMemoryStorage {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = Tables::clone(&guard);
        Ok(MemoryTx { guard, staged })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<()> {
        let MemoryTx { mut guard, staged } = tx;
        *guard = staged;
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<()> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl ExhibitionStorage for InMemoryStorage {
    async fn insert_exhibition(&self, tx: &mut MemoryTx, exhibition: &Exhibition) -> Result<()> {
        let exhibitions = &mut tx.staged.exhibitions;
        if exhibitions.contains_key(&exhibition.id) {
            return Err(conflict(EntityKind::Exhibition, "exhibitions_pkey"));
        }
        if exhibitions
            .values()
            .any(|e| e.details.title == exhibition.details.title)
        {
            return Err(conflict(EntityKind::Exhibition, "exhibitions_title_key"));
        }
        exhibitions.insert(exhibition.id, exhibition.clone());
        Ok(())
    }

    async fn get_exhibition(&self, id: ExhibitionId) -> Result<Option<Exhibition>> {
        Ok(self.tables.lock().await.exhibitions.get(&id).cloned())
    }

    async fn list_exhibitions(
        &self,
        filter: &ExhibitionFilter,
        page: PageRequest,
    ) -> Result<Page<Exhibition>> {
        let tables = self.tables.lock().await;
        let rows = tables
            .exhibitions
            .values()
            .filter(|e| {
                filter
                    .title_prefix
                    .as_deref()
                    .is_none_or(|prefix| e.details.title.starts_with(prefix))
            })
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.organizer_id.is_none_or(|o| e.organizer_id == Some(o)))
            .cloned()
            .collect();
        Ok(paginate(rows, page, |e: &Exhibition| e.created_at))
    }

    async fn update_exhibition_status(
        &self,
        tx: &mut MemoryTx,
        update: &StatusUpdate<ExhibitionId, ExhibitionStatus>,
    ) -> Result<u64> {
        let Some(row) = tx.staged.exhibitions.get_mut(&update.key) else {
            return Ok(0);
        };
        if row.version != update.expected_version {
            return Ok(0);
        }
        row.status = update.status;
        row.version = update.next_version();
        row.submitted_at = update.milestones.submitted_at.apply(row.submitted_at);
        row.approved_at = update.milestones.approved_at.apply(row.approved_at);
        row.updated_at = update.updated_at;
        Ok(1)
    }
}

#[async_trait]
impl CompanyStorage for InMemoryStorage {
    async fn insert_company(&self, tx: &mut MemoryTx, company: &Company) -> Result<()> {
        if tx.staged.companies.contains_key(&company.id) {
            return Err(conflict(EntityKind::Company, "companies_pkey"));
        }
        tx.staged.companies.insert(company.id, company.clone());
        Ok(())
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self.tables.lock().await.companies.get(&id).cloned())
    }

    async fn update_company_details(
        &self,
        tx: &mut MemoryTx,
        id: CompanyId,
        details: &CompanyDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<u64> {
        let Some(row) = tx.staged.companies.get_mut(&id) else {
            return Ok(0);
        };
        row.details = details.clone();
        row.version += 1;
        row.updated_at = updated_at;
        Ok(1)
    }
}

#[async_trait]
impl<I: ParticipantTable> ParticipantStorage<I> for InMemoryStorage {
    async fn insert_participant(
        &self,
        tx: &mut MemoryTx,
        participant: &Participant<I>,
    ) -> Result<()> {
        let table = I::table_mut(&mut tx.staged);
        if table.contains_key(&participant.id) {
            return Err(conflict(I::ENTITY, "pkey"));
        }
        if table
            .values()
            .any(|p| p.profile.name == participant.profile.name)
        {
            return Err(conflict(I::ENTITY, "name_key"));
        }
        table.insert(participant.id, participant.clone());
        Ok(())
    }

    async fn get_participant(&self, id: I) -> Result<Option<Participant<I>>> {
        let tables = self.tables.lock().await;
        Ok(I::table(&tables).get(&id).cloned())
    }

    async fn list_participants(
        &self,
        filter: &ParticipantFilter,
        page: PageRequest,
    ) -> Result<Page<Participant<I>>> {
        let tables = self.tables.lock().await;
        let rows = I::table(&tables)
            .values()
            .filter(|p| {
                filter
                    .name_prefix
                    .as_deref()
                    .is_none_or(|prefix| p.profile.name.starts_with(prefix))
            })
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        Ok(paginate(rows, page, |p: &Participant<I>| p.created_at))
    }

    async fn update_participant(
        &self,
        tx: &mut MemoryTx,
        update: &StatusUpdate<I, ParticipantStatus>,
        profile: Option<&Profile>,
    ) -> Result<u64> {
        let table = I::table_mut(&mut tx.staged);
        if let Some(profile) = profile
            && table
                .values()
                .any(|p| p.id != update.key && p.profile.name == profile.name)
        {
            return Err(conflict(I::ENTITY, "name_key"));
        }
        let Some(row) = table.get_mut(&update.key) else {
            return Ok(0);
        };
        if row.version != update.expected_version {
            return Ok(0);
        }
        row.status = update.status;
        row.version = update.next_version();
        row.submitted_at = update.milestones.submitted_at.apply(row.submitted_at);
        row.approved_at = update.milestones.approved_at.apply(row.approved_at);
        row.updated_at = update.updated_at;
        if let Some(profile) = profile {
            row.profile = profile.clone();
        }
        Ok(1)
    }
}

#[async_trait]
impl ApplicationStorage for InMemoryStorage {
    async fn insert_application(&self, tx: &mut MemoryTx, application: &Application) -> Result<()> {
        if tx.staged.applications.contains_key(&application.key) {
            return Err(conflict(EntityKind::Application, "exhibition_merchants_pkey"));
        }
        tx.staged
            .applications
            .insert(application.key, application.clone());
        Ok(())
    }

    async fn get_application(&self, key: ApplicationKey) -> Result<Option<Application>> {
        Ok(self.tables.lock().await.applications.get(&key).cloned())
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        page: PageRequest,
    ) -> Result<Page<Application>> {
        let tables = self.tables.lock().await;
        let rows = tables
            .applications
            .values()
            .filter(|a| filter.exhibition_id.is_none_or(|id| a.key.exhibition_id == id))
            .filter(|a| filter.merchant_id.is_none_or(|id| a.key.merchant_id == id))
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();
        Ok(paginate(rows, page, |a: &Application| a.created_at))
    }

    async fn update_application(
        &self,
        tx: &mut MemoryTx,
        update: &StatusUpdate<ApplicationKey, ApplicationStatus>,
    ) -> Result<u64> {
        let Some(row) = tx.staged.applications.get_mut(&update.key) else {
            return Ok(0);
        };
        if row.version != update.expected_version {
            return Ok(0);
        }
        row.status = update.status;
        row.version = update.next_version();
        row.submitted_at = update.milestones.submitted_at.apply(row.submitted_at);
        row.approved_at = update.milestones.approved_at.apply(row.approved_at);
        row.updated_at = update.updated_at;
        Ok(1)
    }
}

/// Task queue sharing the tables of an [`InMemoryStorage`].
///
/// Staged tasks become due candidates only when the surrounding storage
/// transaction commits. Claiming a task removes it, so each task is
/// delivered at most once.
#[derive(Clone)]
pub struct InMemoryTaskQueue {
    tables: Arc<Mutex<Tables>>,
    wake: Arc<Notify>,
    wakeups: Arc<parking_lot::Mutex<Vec<TaskType>>>,
    reject_next: Arc<AtomicBool>,
}

impl InMemoryTaskQueue {
    pub fn new(storage: &InMemoryStorage) -> Self {
        Self {
            tables: storage.tables.clone(),
            wake: Arc::new(Notify::new()),
            wakeups: Arc::new(parking_lot::Mutex::new(Vec::new())),
            reject_next: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make the next `schedule_task` call fail, as an unavailable task store would.
    pub fn reject_next_schedule(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// Wake-up hints received so far, oldest first.
    pub fn wakeups(&self) -> Vec<TaskType> {
        self.wakeups.lock().clone()
    }

    /// Committed tasks not yet claimed, ordered by fire time.
    pub async fn armed_tasks(&self) -> Vec<FiredTask> {
        let mut tasks = self.tables.lock().await.tasks.clone();
        tasks.sort_by_key(|t| t.fire_at);
        tasks
    }
}

#[async_trait]
impl TaskManager<MemoryTx> for InMemoryTaskQueue {
    async fn schedule_task(&self, tx: &mut MemoryTx, task: NewScheduledTask) -> Result<()> {
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow::anyhow!("task store rejected {}", task.task_type).into());
        }
        tx.staged.tasks.push(FiredTask {
            id: Uuid::new_v4(),
            task_type: task.task_type,
            custom_id: task.custom_id,
            payload: task.payload,
            fire_at: task.fire_at,
        });
        Ok(())
    }

    fn wake_up(&self, task_type: TaskType) {
        self.wakeups.lock().push(task_type);
        self.wake.notify_one();
    }
}

#[async_trait]
impl DueTaskSource for InMemoryTaskQueue {
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<FiredTask>> {
        let mut tables = self.tables.lock().await;
        tables.tasks.sort_by_key(|t| t.fire_at);

        let mut claimed = Vec::new();
        tables.tasks.retain(|task| {
            if claimed.len() < limit && task.fire_at <= now {
                claimed.push(task.clone());
                false
            } else {
                true
            }
        });
        Ok(claimed)
    }

    fn wake_signal(&self) -> Arc<Notify> {
        self.wake.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::{ExhibitionDetails, ExhibitionSchedule, Milestones, NewExhibition};

    fn exhibition(title: &str) -> Exhibition {
        let now = Utc::now();
        Exhibition::create(
            NewExhibition {
                organizer_id: None,
                details: ExhibitionDetails {
                    title: title.to_string(),
                    ..Default::default()
                },
                schedule: ExhibitionSchedule {
                    registration_start: now + Duration::days(1),
                    registration_end: now + Duration::days(2),
                    start_time: now + Duration::days(3),
                    end_time: now + Duration::days(4),
                },
            },
            now,
        )
    }

    fn submit(
        e: &Exhibition,
        expected_version: i64,
    ) -> StatusUpdate<ExhibitionId, ExhibitionStatus> {
        StatusUpdate {
            key: e.id,
            expected_version,
            status: ExhibitionStatus::Pending,
            milestones: Milestones::submitted(Utc::now()),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let storage = InMemoryStorage::new();
        let e = exhibition("Rollback Expo");

        let mut tx = storage.begin().await.unwrap();
        storage.insert_exhibition(&mut tx, &e).await.unwrap();
        storage.rollback(tx).await.unwrap();

        assert!(storage.get_exhibition(e.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conditional_update_checks_version() {
        let storage = InMemoryStorage::new();
        let e = exhibition("Versioned Expo");
        storage.seed_exhibition(e.clone()).await;

        let mut tx = storage.begin().await.unwrap();
        assert_eq!(
            storage.update_exhibition_status(&mut tx, &submit(&e, 7)).await.unwrap(),
            0
        );
        assert_eq!(
            storage.update_exhibition_status(&mut tx, &submit(&e, 0)).await.unwrap(),
            1
        );
        storage.commit(tx).await.unwrap();

        let stored = storage.get_exhibition(e.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, ExhibitionStatus::Pending);
        assert!(stored.submitted_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_title_is_a_structured_conflict() {
        let storage = InMemoryStorage::new();
        storage.seed_exhibition(exhibition("Same Name")).await;

        let mut tx = storage.begin().await.unwrap();
        let err = storage
            .insert_exhibition(&mut tx, &exhibition("Same Name"))
            .await
            .unwrap_err();
        storage.rollback(tx).await.unwrap();

        assert!(matches!(
            err,
            VernissageError::Conflict { entity: EntityKind::Exhibition, ref constraint }
                if constraint == "exhibitions_title_key"
        ));
    }

    #[tokio::test]
    async fn staged_tasks_appear_on_commit_and_are_claimed_once() {
        let storage = InMemoryStorage::new();
        let queue = InMemoryTaskQueue::new(&storage);
        let id = ExhibitionId::new();
        let now = Utc::now();

        let mut tx = storage.begin().await.unwrap();
        for (task_type, offset) in [(TaskType::AutoEnd, 2), (TaskType::AutoStartEnrolling, 1)] {
            let task =
                NewScheduledTask::deadline(task_type, id, now - Duration::seconds(offset)).unwrap();
            queue.schedule_task(&mut tx, task).await.unwrap();
        }
        storage.commit(tx).await.unwrap();
        assert_eq!(queue.armed_tasks().await.len(), 2);

        let first = queue.claim_due(now, 1).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].task_type, TaskType::AutoEnd);

        let rest = queue.claim_due(now, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(queue.claim_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn future_tasks_are_not_claimed() {
        let storage = InMemoryStorage::new();
        let queue = InMemoryTaskQueue::new(&storage);
        let now = Utc::now();

        let mut tx = storage.begin().await.unwrap();
        let task = NewScheduledTask::deadline(
            TaskType::AutoStartRunning,
            ExhibitionId::new(),
            now + Duration::hours(1),
        )
        .unwrap();
        queue.schedule_task(&mut tx, task).await.unwrap();
        storage.commit(tx).await.unwrap();

        assert!(queue.claim_due(now, 10).await.unwrap().is_empty());
        assert_eq!(queue.armed_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn rejected_schedule_fails_once() {
        let storage = InMemoryStorage::new();
        let queue = InMemoryTaskQueue::new(&storage);
        queue.reject_next_schedule();

        let mut tx = storage.begin().await.unwrap();
        let task =
            NewScheduledTask::deadline(TaskType::AutoEnd, ExhibitionId::new(), Utc::now()).unwrap();
        assert!(queue.schedule_task(&mut tx, task.clone()).await.is_err());
        assert!(queue.schedule_task(&mut tx, task).await.is_ok());
        storage.rollback(tx).await.unwrap();

        assert!(queue.armed_tasks().await.is_empty());
    }
}
