//! Turns fired deadline tasks back into exhibition events.
//!
//! A fired task goes through the same legality and version checks as an
//! operator's event. If the exhibition has moved on (say it was cancelled
//! before registration opened) the task is reported as an
//! `IllegalTransition`. Whether to retry is up to the task manager.

use std::sync::Arc;

use async_trait::async_trait;

use super::{TaskHandler, TaskManager};
use crate::domain::{FiredTask, TaskType};
use crate::error::Result;
use crate::storage::{ExhibitionStorage, Transactional};
use crate::workflow::ExhibitionWorkflow;

pub struct TaskFiredAdapter<S, T> {
    exhibitions: Arc<ExhibitionWorkflow<S, T>>,
}

impl<S, T> TaskFiredAdapter<S, T> {
    pub fn new(exhibitions: Arc<ExhibitionWorkflow<S, T>>) -> Self {
        Self { exhibitions }
    }
}

#[async_trait]
impl<S, T> TaskHandler for TaskFiredAdapter<S, T>
where
    S: ExhibitionStorage + 'static,
    T: TaskManager<<S as Transactional>::Tx> + 'static,
{
    #[tracing::instrument(
        skip(self, task),
        fields(task_id = %task.id, task_type = %task.task_type, custom_id = %task.custom_id)
    )]
    async fn on_task_fired(&self, task: FiredTask) -> Result<()> {
        match task.task_type {
            TaskType::AutoStartEnrolling => {
                self.exhibitions
                    .handle_task_auto_start_enrolling(task)
                    .await
            }
            TaskType::AutoEndEnrolling => {
                self.exhibitions.handle_task_auto_end_enrolling(task).await
            }
            TaskType::AutoStartRunning => {
                self.exhibitions.handle_task_auto_start_running(task).await
            }
            TaskType::AutoEnd => self.exhibitions.handle_task_auto_end(task).await,
        }
    }
}
