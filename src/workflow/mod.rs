//! Transition executors, one per entity type.
//!
//! Every `handle_event` follows the same steps:
//!
//! 1. Read the entity once, without locking.
//! 2. Look up `(status, event)` in the entity's transition table. A missing
//!    cell fails with `IllegalTransition` and writes nothing.
//! 3. Run the bound action in a local transaction. The action issues a
//!    conditional update guarded by the version read in step 1.
//!
//! Concurrent events on the same entity are serialised only by that version
//! check: the loser sees `ConcurrentModification` and nothing is retried here.

pub mod application;
pub mod coordinator;
pub mod exhibition;
pub mod participant;

use std::fmt::Display;
use std::sync::Arc;

use crate::config::WorkflowConfig;
use crate::domain::{EntityKind, FiredTask, MerchantId, ServiceProviderId};
use crate::error::VernissageError;
use crate::storage::{ApplicationStorage, ExhibitionStorage, ParticipantStorage, Transactional};
use crate::tasks::{TaskFiredAdapter, TaskManager};

pub use application::ApplicationWorkflow;
pub use coordinator::ScheduledTransitionCoordinator;
pub use exhibition::ExhibitionWorkflow;
pub use participant::{MerchantWorkflow, ParticipantWorkflow, ServiceProviderWorkflow};

/// Who raised an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EventSource {
    /// An operator or API caller.
    #[default]
    Administrative,
    /// Replay of a scheduled task whose deadline passed.
    Scheduled(FiredTask),
}

impl EventSource {
    pub fn label(&self) -> &'static str {
        match self {
            EventSource::Administrative => "administrative",
            EventSource::Scheduled(_) => "scheduled",
        }
    }
}

pub(crate) fn not_found(entity: EntityKind, key: &impl Display) -> VernissageError {
    VernissageError::NotFound {
        entity,
        key: key.to_string(),
    }
}

/// Log a failed event at a level matching how surprising it is.
pub(crate) fn log_rejection(error: &VernissageError) {
    match error {
        VernissageError::IllegalTransition { .. }
        | VernissageError::NotFound { .. }
        | VernissageError::ConcurrentModification { .. } => {
            tracing::warn!(error = %error, "Event rejected");
        }
        _ => {
            tracing::error!(error = %error, "Event failed");
        }
    }
}

/// One executor per entity type over a shared storage and task manager.
pub struct Workflows<S, T> {
    pub exhibitions: Arc<ExhibitionWorkflow<S, T>>,
    pub merchants: Arc<MerchantWorkflow<S>>,
    pub service_providers: Arc<ServiceProviderWorkflow<S>>,
    pub applications: Arc<ApplicationWorkflow<S>>,
}

impl<S, T> Workflows<S, T>
where
    S: ExhibitionStorage
        + ApplicationStorage
        + ParticipantStorage<MerchantId>
        + ParticipantStorage<ServiceProviderId>
        + 'static,
    T: TaskManager<<S as Transactional>::Tx> + 'static,
{
    pub fn new(storage: Arc<S>, tasks: Arc<T>, config: WorkflowConfig) -> Self {
        Self {
            exhibitions: Arc::new(ExhibitionWorkflow::new(
                storage.clone(),
                tasks,
                config.clone(),
            )),
            merchants: Arc::new(ParticipantWorkflow::new(storage.clone(), config.clone())),
            service_providers: Arc::new(ParticipantWorkflow::new(
                storage.clone(),
                config.clone(),
            )),
            applications: Arc::new(ApplicationWorkflow::new(storage, config)),
        }
    }

    /// Callback to register with the task manager for deadline delivery.
    pub fn task_handler(&self) -> TaskFiredAdapter<S, T> {
        TaskFiredAdapter::new(self.exhibitions.clone())
    }
}
