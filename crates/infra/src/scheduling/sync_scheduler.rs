//! Cron trigger for the periodic full reconciliation run.
//!
//! On every cron firing, the standard batches are started in dependency
//! order: item groups and delivery places before contracts (contract sync
//! resolves both), then business partners, then the cumulative-quantity
//! pass. Starting a batch only enqueues jobs; the queue dispatchers do the
//! actual work at their own pace.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::reconcile::SyncOperations;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Configuration for the reconciliation scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Cron expression describing the execution schedule.
    pub cron_expression: String,
    /// Timeout applied to one full trigger execution.
    pub job_timeout: Duration,
    /// Timeout for starting the underlying scheduler.
    pub start_timeout: Duration,
    /// Timeout for stopping the scheduler.
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 0 2 * * *".into(), // nightly at 02:00
            job_timeout: Duration::from_secs(600),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Reconciliation scheduler with explicit lifecycle management.
pub struct SyncScheduler {
    scheduler: Option<JobScheduler>,
    config: SyncSchedulerConfig,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
    operations: Arc<SyncOperations>,
}

impl SyncScheduler {
    /// Create a scheduler with the default configuration.
    pub fn new(cron_expression: String, operations: Arc<SyncOperations>) -> Self {
        let config = SyncSchedulerConfig { cron_expression, ..Default::default() };
        Self::with_config(config, operations)
    }

    /// Create a scheduler with a custom configuration.
    pub fn with_config(config: SyncSchedulerConfig, operations: Arc<SyncOperations>) -> Self {
        Self {
            scheduler: None,
            config,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
            operations,
        }
    }

    /// Start the scheduler, spawning the monitoring task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler_instance = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;

        let start_result = tokio::time::timeout(start_timeout, scheduler_instance.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?;
        start_result.map_err(|e| SchedulerError::StartFailed(e.to_string()))?;

        self.scheduler = Some(scheduler_instance);

        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            cancel.cancelled().await;
            debug!(scheduler = "sync", "monitor cancelled");
        });
        self.monitor_handle = Some(handle);

        info!(scheduler = "sync", cron = %self.config.cron_expression, "sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the monitor task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let mut scheduler = match self.scheduler.take() {
            Some(scheduler) => scheduler,
            None => return Err(SchedulerError::NotRunning),
        };

        let stop_timeout = self.config.stop_timeout;
        let stop_result =
            tokio::time::timeout(stop_timeout, async move { scheduler.shutdown().await })
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?;
        stop_result.map_err(|e| SchedulerError::StopFailed(e.to_string()))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!(scheduler = "sync", "sync scheduler stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::CreationFailed(e.to_string()))?;

        let cron_expr = self.config.cron_expression.clone();
        let operations = Arc::clone(&self.operations);
        let job_timeout = self.config.job_timeout;

        let job_definition = Job::new_async(cron_expr.as_str(), move |_id, _lock| {
            let operations = operations.clone();

            Box::pin(async move {
                debug!(scheduler = "sync", "reconciliation trigger fired");

                match tokio::time::timeout(job_timeout, Self::run_batches(operations)).await {
                    Ok(Ok(())) => {
                        debug!(scheduler = "sync", "reconciliation batches enqueued");
                    }
                    Ok(Err(e)) => {
                        error!(scheduler = "sync", error = %e, "reconciliation trigger failed");
                    }
                    Err(_) => {
                        warn!(
                            scheduler = "sync",
                            timeout_secs = job_timeout.as_secs(),
                            "reconciliation trigger timed out"
                        );
                    }
                }
            })
        })
        .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        scheduler
            .add(job_definition)
            .await
            .map_err(|e| SchedulerError::JobRegistrationFailed(e.to_string()))?;

        debug!(cron = %self.config.cron_expression, "registered reconciliation trigger");
        Ok(scheduler)
    }

    /// Start the standard batches in dependency order. Item groups and
    /// delivery places go first because contract sync resolves both.
    async fn run_batches(operations: Arc<SyncOperations>) -> coopsync_domain::Result<()> {
        operations.start_item_group_sync().await?;
        operations.start_delivery_place_sync().await?;
        operations.start_contact_sync().await?;
        operations.start_contract_sync().await?;
        operations.start_cumulative_sync().await?;
        Ok(())
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(
                scheduler = "sync",
                "SyncScheduler dropped while running; cancelling tasks"
            );
            self.cancellation.cancel();
        }
    }
}
