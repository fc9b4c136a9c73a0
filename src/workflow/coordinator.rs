//! Status changes that arm the next deadline.
//!
//! The task is staged and the status written in one local transaction:
//!
//! ```text
//! begin ─> schedule_task(tx) ─> update status (version check) ─> commit ─> wake_up
//!              │                          │
//!              └──── error ───────────────┴──> rollback (neither is kept)
//! ```
//!
//! A committed status therefore always has its next deadline armed, and no
//! deadline is armed without its status. The wake-up happens only after a
//! successful commit.

use std::sync::Arc;

use crate::domain::{
    EntityKind, ExhibitionEvent, ExhibitionId, ExhibitionStatus, NewScheduledTask,
};
use crate::error::{Result, VernissageError};
use crate::metrics::record_task_scheduled;
use crate::storage::{ExhibitionStorage, StatusUpdate, Transactional, ensure_applied, finish};
use crate::tasks::TaskManager;

pub struct ScheduledTransitionCoordinator<S, T> {
    storage: Arc<S>,
    tasks: Arc<T>,
}

impl<S, T> ScheduledTransitionCoordinator<S, T>
where
    S: ExhibitionStorage,
    T: TaskManager<<S as Transactional>::Tx>,
{
    pub fn new(storage: Arc<S>, tasks: Arc<T>) -> Self {
        Self { storage, tasks }
    }

    /// Apply `update` and stage `task` atomically, then wake the task manager.
    pub async fn commit_with_deadline(
        &self,
        update: &StatusUpdate<ExhibitionId, ExhibitionStatus>,
        event: ExhibitionEvent,
        task: NewScheduledTask,
    ) -> Result<()> {
        let task_type = task.task_type;
        let fire_at = task.fire_at;

        let mut tx = self.storage.begin().await?;
        let outcome = self.stage_and_write(&mut tx, update, event, task).await;
        finish(self.storage.as_ref(), tx, outcome).await?;

        record_task_scheduled(task_type);
        tracing::debug!(
            exhibition_id = %update.key,
            task_type = %task_type,
            task_code = task_type.code(),
            fire_at = %fire_at,
            "Deadline armed"
        );
        self.tasks.wake_up(task_type);
        Ok(())
    }

    async fn stage_and_write(
        &self,
        tx: &mut <S as Transactional>::Tx,
        update: &StatusUpdate<ExhibitionId, ExhibitionStatus>,
        event: ExhibitionEvent,
        task: NewScheduledTask,
    ) -> Result<()> {
        let task_type = task.task_type;
        self.tasks
            .schedule_task(tx, task)
            .await
            .map_err(|e| VernissageError::SchedulingFailure {
                entity: EntityKind::Exhibition,
                key: update.key.to_string(),
                task_type,
                source: match e {
                    VernissageError::Other(source) => source,
                    other => anyhow::Error::new(other),
                },
            })?;

        let rows = self.storage.update_exhibition_status(tx, update).await?;
        ensure_applied(
            rows,
            EntityKind::Exhibition,
            &update.key,
            &event,
            update.expected_version,
        )
    }
}
