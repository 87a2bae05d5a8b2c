//! Queue manager dispatching persistent jobs to reconciliation tasks.
//!
//! Each named queue runs an isolated dispatcher loop: claim up to the
//! queue's concurrency limit of pending jobs, run the processor future per
//! job under the per-job deadline, then settle job and report item from the
//! outcome. The manager, not the task, completes the report item after
//! awaiting the task future, which makes the exactly-once completion
//! invariant structural instead of a callback discipline.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use coopsync_infra::queue::{QueueManager, QueueOptions};
//!
//! # async fn example(
//! #     jobs: Arc<dyn coopsync_core::JobStore>,
//! #     reports: Arc<dyn coopsync_core::ReportStore>,
//! #     clock: Arc<dyn coopsync_core::Clock>,
//! #     task: Arc<dyn coopsync_infra::queue::JobProcessor>,
//! # ) -> coopsync_domain::Result<()> {
//! let mut manager = QueueManager::new(jobs, reports, clock);
//! let handle = manager.create_queue(
//!     "contact-sync",
//!     task,
//!     QueueOptions { concurrent: 4, ..Default::default() },
//! );
//!
//! manager.start().await?;
//! handle.push("contact-C-100", &serde_json::json!({"CardCode": "C-100"}), None).await?;
//! // ... application runs ...
//! manager.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coopsync_core::queue_ports::{JobStore, ReportStore};
use coopsync_core::time::Clock;
use coopsync_domain::{CoopsyncError, Result, SyncJob};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one job run, produced by the task future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Job finished; the report item completes successfully.
    Success { message: String },
    /// Recoverable business failure; the report item completes as failed
    /// and the batch continues.
    Failure { message: String },
    /// Ordering retry: the job returns to pending and the report item stays
    /// open. Coalescing by job id bounds the loop.
    Requeue { message: String },
}

/// A reconciliation task bound to a queue.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Run one job to an outcome. Returning `Err` is equivalent to a
    /// [`TaskOutcome::Failure`] carrying the error's message.
    async fn process(&self, job: &SyncJob) -> Result<TaskOutcome>;
}

/// Per-queue tuning knobs.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Maximum jobs run in parallel per dispatcher pass.
    pub concurrent: usize,
    /// Delay before the next dispatcher pass after a batch completes.
    pub after_process_delay: Duration,
    /// Per-job deadline; overrun surfaces as a failure outcome.
    pub max_timeout: Duration,
    /// Join timeout when stopping the dispatcher.
    pub join_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            concurrent: 1,
            after_process_delay: Duration::from_secs(1),
            max_timeout: Duration::from_secs(60),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Cheap handle for pushing work into one named queue.
#[derive(Clone)]
pub struct QueueHandle {
    name: String,
    jobs: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl QueueHandle {
    /// Queue this handle pushes into.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue or rebind a job keyed by `id`.
    ///
    /// Pushing a payload whose id matches a pending job rebinds the payload
    /// instead of duplicating the work.
    pub async fn push<T: Serialize>(
        &self,
        id: impl Into<String>,
        payload: &T,
        report_item_id: Option<String>,
    ) -> Result<()> {
        let payload_json = serde_json::to_string(payload)
            .map_err(|e| CoopsyncError::Internal(format!("failed to serialize payload: {e}")))?;
        let job =
            SyncJob::new(&self.name, id, payload_json, report_item_id, self.clock.now());
        self.jobs.push(&job).await
    }

    /// Number of jobs still pending in this queue.
    pub async fn pending_count(&self) -> Result<u64> {
        self.jobs.pending_count(&self.name).await
    }
}

struct QueueSpec {
    name: String,
    processor: Arc<dyn JobProcessor>,
    options: QueueOptions,
}

#[derive(Default)]
struct BatchResult {
    settled: usize,
    requeued: Vec<String>,
}

/// Manager owning the dispatcher loops of every named queue.
pub struct QueueManager {
    jobs: Arc<dyn JobStore>,
    reports: Arc<dyn ReportStore>,
    clock: Arc<dyn Clock>,
    specs: Vec<Arc<QueueSpec>>,
    cancellation: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl QueueManager {
    /// Create a manager over the given persistence ports.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        reports: Arc<dyn ReportStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            jobs,
            reports,
            clock,
            specs: Vec::new(),
            cancellation: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Register a named queue with its processor and options, returning the
    /// handle used to push work. The dispatcher starts with
    /// [`QueueManager::start`].
    pub fn create_queue(
        &mut self,
        name: impl Into<String>,
        processor: Arc<dyn JobProcessor>,
        options: QueueOptions,
    ) -> QueueHandle {
        let name = name.into();
        self.specs.push(Arc::new(QueueSpec {
            name: name.clone(),
            processor,
            options,
        }));

        QueueHandle { name, jobs: Arc::clone(&self.jobs), clock: Arc::clone(&self.clock) }
    }

    /// Handle for a queue registered earlier.
    pub fn handle(&self, name: &str) -> Option<QueueHandle> {
        self.specs.iter().find(|spec| spec.name == name).map(|spec| QueueHandle {
            name: spec.name.clone(),
            jobs: Arc::clone(&self.jobs),
            clock: Arc::clone(&self.clock),
        })
    }

    /// Start one dispatcher per registered queue.
    ///
    /// Jobs left active by an interrupted process are reset to pending
    /// before the first pass, so persisted work resumes after a restart.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(CoopsyncError::InvalidInput("queue manager already running".into()));
        }

        self.cancellation = CancellationToken::new();

        for spec in &self.specs {
            let recovered = self.jobs.reset_interrupted(&spec.name).await?;
            if recovered > 0 {
                info!(queue = %spec.name, recovered, "recovered interrupted jobs");
            }

            let jobs = Arc::clone(&self.jobs);
            let reports = Arc::clone(&self.reports);
            let spec = Arc::clone(spec);
            let cancel = self.cancellation.clone();

            let handle = tokio::spawn(async move {
                Self::dispatch_loop(jobs, reports, spec, cancel).await;
            });
            self.handles.push(handle);
        }

        info!(queues = self.specs.len(), "queue manager started");
        Ok(())
    }

    /// Stop every dispatcher and wait for them to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(CoopsyncError::InvalidInput("queue manager not running".into()));
        }

        self.cancellation.cancel();

        let join_timeout = self
            .specs
            .iter()
            .map(|spec| spec.options.join_timeout)
            .max()
            .unwrap_or(Duration::from_secs(5));

        for handle in self.handles.drain(..) {
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("dispatcher task panicked: {e}"),
                Err(_) => warn!("dispatcher did not stop within {}s", join_timeout.as_secs()),
            }
        }

        self.cancellation = CancellationToken::new();
        info!("queue manager stopped");
        Ok(())
    }

    /// Returns true when dispatchers are active.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Run a queue until no pending jobs remain.
    ///
    /// Used by batch runs that must observe a drained queue. Stops early
    /// once every remaining job has asked to be requeued without anything
    /// settling in between (the prerequisite will never arrive within this
    /// run); those jobs stay pending for the next external run.
    pub async fn drain(&self, name: &str) -> Result<()> {
        let spec = self
            .specs
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| CoopsyncError::NotFound(format!("queue {name} is not registered")))?;

        let mut stalled: std::collections::HashSet<String> = std::collections::HashSet::new();
        loop {
            let batch = self.jobs.claim_pending(&spec.name, spec.options.concurrent).await?;
            if batch.is_empty() {
                return Ok(());
            }

            let result = Self::run_batch(&self.jobs, &self.reports, spec, batch).await;
            if result.settled > 0 {
                stalled.clear();
                continue;
            }

            stalled.extend(result.requeued);
            let pending = self.jobs.pending_count(&spec.name).await?;
            if stalled.len() as u64 >= pending {
                warn!(
                    queue = %spec.name,
                    stalled = stalled.len(),
                    "every remaining job keeps requeueing; leaving them for the next run"
                );
                return Ok(());
            }
        }
    }

    async fn dispatch_loop(
        jobs: Arc<dyn JobStore>,
        reports: Arc<dyn ReportStore>,
        spec: Arc<QueueSpec>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(queue = %spec.name, "dispatcher cancelled");
                    break;
                }
                _ = tokio::time::sleep(spec.options.after_process_delay) => {
                    match jobs.claim_pending(&spec.name, spec.options.concurrent).await {
                        Err(e) => {
                            error!(queue = %spec.name, error = %e, "failed to claim jobs");
                        }
                        Ok(batch) if batch.is_empty() => {
                            debug!(queue = %spec.name, "no pending jobs");
                        }
                        Ok(batch) => {
                            Self::run_batch(&jobs, &reports, &spec, batch).await;
                        }
                    }
                }
            }
        }
    }

    /// Run one claimed batch concurrently; reports how many jobs settled
    /// (finished or failed) and which ones asked to be requeued.
    async fn run_batch(
        jobs: &Arc<dyn JobStore>,
        reports: &Arc<dyn ReportStore>,
        spec: &QueueSpec,
        batch: Vec<SyncJob>,
    ) -> BatchResult {
        debug!(queue = %spec.name, count = batch.len(), "processing batch");

        let runs = batch
            .into_iter()
            .map(|job| Self::run_job(jobs, reports, &spec.processor, spec.options.max_timeout, job));
        let outcomes = futures::future::join_all(runs).await;

        let mut result = BatchResult::default();
        for (job_id, settled) in outcomes {
            if settled {
                result.settled += 1;
            } else {
                result.requeued.push(job_id);
            }
        }
        result
    }

    /// Run a single job to its outcome and settle job plus report item.
    /// Returns the job id and whether it settled (as opposed to requeued).
    ///
    /// The report item is completed here, exactly once, regardless of
    /// whether the task succeeded, failed a business rule, errored, or
    /// overran its deadline.
    async fn run_job(
        jobs: &Arc<dyn JobStore>,
        reports: &Arc<dyn ReportStore>,
        processor: &Arc<dyn JobProcessor>,
        max_timeout: Duration,
        job: SyncJob,
    ) -> (String, bool) {
        let outcome = match tokio::time::timeout(max_timeout, processor.process(&job)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => TaskOutcome::Failure { message: err.to_string() },
            Err(_) => TaskOutcome::Failure {
                message: format!("job timed out after {}s", max_timeout.as_secs()),
            },
        };

        let settled = match outcome {
            TaskOutcome::Success { message } => {
                debug!(job_id = %job.id, queue = %job.queue, "job finished");
                if let Err(e) = jobs.mark_finished(&job.id).await {
                    warn!(job_id = %job.id, error = %e, "mark_finished failed");
                }
                Self::complete_report_item(reports, &job, true, &message).await;
                true
            }
            TaskOutcome::Failure { message } => {
                warn!(job_id = %job.id, queue = %job.queue, failure = %message, "job failed");
                if let Err(e) = jobs.mark_failed(&job.id, &message).await {
                    warn!(job_id = %job.id, error = %e, "mark_failed failed");
                }
                Self::complete_report_item(reports, &job, false, &message).await;
                true
            }
            TaskOutcome::Requeue { message } => {
                debug!(job_id = %job.id, queue = %job.queue, reason = %message, "job requeued");
                if let Err(e) = jobs.requeue(&job.id).await {
                    warn!(job_id = %job.id, error = %e, "requeue failed");
                }
                false
            }
        };

        (job.id, settled)
    }

    async fn complete_report_item(
        reports: &Arc<dyn ReportStore>,
        job: &SyncJob,
        success: bool,
        message: &str,
    ) {
        let Some(item_id) = &job.report_item_id else { return };
        if let Err(e) = reports.complete_item(item_id, success, message).await {
            warn!(
                job_id = %job.id,
                report_item_id = %item_id,
                error = %e,
                "failed to complete report item"
            );
        }
    }
}

impl Drop for QueueManager {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("QueueManager dropped while running; cancelling dispatchers");
            self.cancellation.cancel();
        }
    }
}
