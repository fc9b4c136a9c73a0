//! Lifecycle workflows for exhibitions and the parties taking part in them.
//!
//! Exhibitions, merchants, service providers and exhibition applications each
//! move through their own state machine. Transitions are driven by operators
//! or by deadlines from the exhibition schedule, and every write is an
//! optimistic, version-checked update. A transition that arms a deadline
//! stages the scheduled task in the same local transaction as the status
//! change, so a status is never committed without its next deadline.
//!
//! Storage is pluggable through the traits in [`storage`]: an in-memory
//! implementation ships for tests and embedding, and a PostgreSQL one sits
//! behind the `postgres` feature.

pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
mod metrics;
pub mod storage;
pub mod tasks;
pub mod workflow;

// Re-export commonly used types
pub use config::WorkflowConfig;
pub use daemon::{DueTaskSource, TaskDaemon, TaskDaemonConfig};
pub use domain::*;
pub use error::{Result, VernissageError};
#[cfg(feature = "postgres")]
pub use storage::postgres::{PoolProvider, PostgresStorage, TestDbPools};
pub use storage::memory::{InMemoryStorage, InMemoryTaskQueue};
pub use storage::{
    ApplicationFilter, ApplicationStorage, CompanyStorage, ExhibitionFilter, ExhibitionStorage,
    ParticipantFilter, ParticipantStorage, StatusUpdate, Transactional,
};
pub use tasks::{TaskFiredAdapter, TaskHandler, TaskManager};
pub use workflow::{
    ApplicationWorkflow, EventSource, ExhibitionWorkflow, MerchantWorkflow, ParticipantWorkflow,
    ScheduledTransitionCoordinator, ServiceProviderWorkflow, Workflows,
};

/// Get the vernissage database migrator
///
/// Returns a migrator that can be run against a connection pool.
#[cfg(feature = "postgres")]
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}
