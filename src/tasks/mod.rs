//! Narrow interface to the external task manager.
//!
//! The task manager owns the durable queue, polling and delivery. This crate
//! only stages tasks inside its own transactions, nudges the manager after a
//! commit, and handles delivery through [`TaskHandler`].

pub mod adapter;

use async_trait::async_trait;

use crate::domain::{FiredTask, NewScheduledTask, TaskType};
use crate::error::Result;

pub use adapter::TaskFiredAdapter;

/// Scheduling side of the task manager, parameterised by the storage transaction type.
#[async_trait]
pub trait TaskManager<Tx: Send>: Send + Sync {
    /// Insert `task` as part of the caller's transaction. Nothing is visible
    /// to the poller until that transaction commits.
    async fn schedule_task(&self, tx: &mut Tx, task: NewScheduledTask) -> Result<()>;

    /// Hint that a task of `task_type` may now be due. Only affects latency.
    fn wake_up(&self, task_type: TaskType);
}

/// Delivery callback invoked when a task's fire time has passed.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn on_task_fired(&self, task: FiredTask) -> Result<()>;
}
