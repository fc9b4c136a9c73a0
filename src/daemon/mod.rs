//! Polling loop that delivers due scheduled tasks to a [`TaskHandler`].
//!
//! The loop claims due tasks from a [`DueTaskSource`], hands each to the
//! handler, and sleeps until the next poll or until a wake-up hint arrives.
//! A handler error marks the task handled-with-error: it is logged and
//! counted, never redelivered by this loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::domain::FiredTask;
use crate::error::Result;
use crate::tasks::TaskHandler;

/// Source of due tasks, implemented by the task store.
#[async_trait]
pub trait DueTaskSource: Send + Sync {
    /// Remove and return up to `limit` tasks whose fire time is at or before `now`,
    /// earliest first.
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<FiredTask>>;

    /// Notified when a task may have become due ahead of the next poll.
    fn wake_signal(&self) -> Arc<Notify>;
}

/// Configuration for the task delivery loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDaemonConfig {
    /// How long to sleep between polls when no wake-up arrives
    pub poll_interval_ms: u64,

    /// Maximum number of tasks to claim in each iteration
    pub claim_batch_size: usize,

    /// Maximum number of tasks delivered concurrently
    pub max_concurrent_deliveries: usize,

    /// Interval for logging delivery counters in milliseconds.
    /// Set to None to disable periodic status logging
    pub status_log_interval_ms: Option<u64>,
}

impl Default for TaskDaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            claim_batch_size: 100,
            max_concurrent_deliveries: 10,
            status_log_interval_ms: Some(30000), // Log every 30 seconds by default
        }
    }
}

pub struct TaskDaemon<Q, H> {
    source: Arc<Q>,
    handler: Arc<H>,
    config: TaskDaemonConfig,
    tasks_delivered: Arc<AtomicU64>,
    tasks_failed: Arc<AtomicU64>,
    shutdown_token: CancellationToken,
}

impl<Q, H> TaskDaemon<Q, H>
where
    Q: DueTaskSource + 'static,
    H: TaskHandler + 'static,
{
    pub fn new(
        source: Arc<Q>,
        handler: Arc<H>,
        config: TaskDaemonConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            handler,
            config,
            tasks_delivered: Arc::new(AtomicU64::new(0)),
            tasks_failed: Arc::new(AtomicU64::new(0)),
            shutdown_token,
        }
    }

    /// Tasks whose handler returned `Ok`.
    pub fn tasks_delivered(&self) -> u64 {
        self.tasks_delivered.load(Ordering::Relaxed)
    }

    /// Tasks handled with an error.
    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    /// Claim one batch of tasks due at `now` and deliver them.
    ///
    /// Returns how many tasks were claimed.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let tasks = self
            .source
            .claim_due(now, self.config.claim_batch_size.max(1))
            .await?;
        let claimed = tasks.len();

        futures::stream::iter(tasks)
            .for_each_concurrent(self.config.max_concurrent_deliveries.max(1), |task| async move {
                self.deliver(task).await;
            })
            .await;

        Ok(claimed)
    }

    async fn deliver(&self, task: FiredTask) {
        let task_id = task.id;
        let task_type = task.task_type;
        let custom_id = task.custom_id.clone();

        match self.handler.on_task_fired(task).await {
            Ok(()) => {
                self.tasks_delivered.fetch_add(1, Ordering::Relaxed);
                counter!(
                    "vernissage_tasks_fired_total",
                    "task_type" => task_type.as_str(),
                    "outcome" => "handled"
                )
                .increment(1);
                tracing::debug!(
                    task_id = %task_id,
                    task_type = %task_type,
                    custom_id = %custom_id,
                    "Scheduled task handled"
                );
            }
            Err(e) => {
                self.tasks_failed.fetch_add(1, Ordering::Relaxed);
                counter!(
                    "vernissage_tasks_fired_total",
                    "task_type" => task_type.as_str(),
                    "outcome" => e.outcome_label()
                )
                .increment(1);
                tracing::warn!(
                    task_id = %task_id,
                    task_type = %task_type,
                    custom_id = %custom_id,
                    error = %e,
                    "Scheduled task handled with error"
                );
            }
        }
    }

    /// Run until the shutdown token is cancelled.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval_ms,
            claim_batch_size = self.config.claim_batch_size,
            "Task daemon starting"
        );

        if let Some(interval_ms) = self.config.status_log_interval_ms {
            let delivered = self.tasks_delivered.clone();
            let failed = self.tasks_failed.clone();
            let shutdown = self.shutdown_token.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            tracing::debug!(
                                tasks_delivered = delivered.load(Ordering::Relaxed),
                                tasks_failed = failed.load(Ordering::Relaxed),
                                "Task daemon status"
                            );
                        }
                        _ = shutdown.cancelled() => break,
                    }
                }
            });
        }

        let wake = self.source.wake_signal();
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let batch_size = self.config.claim_batch_size.max(1);

        loop {
            // Drain everything already due before sleeping again.
            loop {
                match self.run_once(Utc::now()).await {
                    Ok(claimed) if claimed >= batch_size => continue,
                    Ok(_) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to claim due tasks");
                        break;
                    }
                }
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Shutdown signal received, stopping task daemon");
                    break;
                }
                _ = wake.notified() => {
                    tracing::trace!("Task daemon woken up");
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        Ok(())
    }
}
