//! Metric names and recording helpers.
//!
//! Everything goes through the `metrics` facade; install any recorder
//! (for example a Prometheus exporter) in the host process to collect them.
//!
//! - `vernissage_transitions_total{entity, event, outcome}`
//! - `vernissage_tasks_scheduled_total{task_type}`
//! - `vernissage_tasks_fired_total{task_type, outcome}` (recorded by the task daemon)

use metrics::counter;

use crate::domain::{EntityKind, TaskType};
use crate::error::Result;

pub(crate) fn record_transition(entity: EntityKind, event: &'static str, result: &Result<()>) {
    let outcome = match result {
        Ok(()) => "applied",
        Err(e) => e.outcome_label(),
    };
    counter!(
        "vernissage_transitions_total",
        "entity" => entity.as_str(),
        "event" => event,
        "outcome" => outcome
    )
    .increment(1);
}

pub(crate) fn record_task_scheduled(task_type: TaskType) {
    counter!(
        "vernissage_tasks_scheduled_total",
        "task_type" => task_type.as_str()
    )
    .increment(1);
}
