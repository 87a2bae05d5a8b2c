//! Port interfaces for the persistent job queue and operation reports

use async_trait::async_trait;
use coopsync_domain::{OperationReport, OperationReportItem, OperationReportSummary, Result, SyncJob};

/// Persistence behind the named job queues.
///
/// Queue state lives in the store, not in memory, so jobs surviving a
/// process restart are picked up again by the next dispatcher pass.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a pending job, or rebind the payload of an existing job with
    /// the same id (coalescing duplicate work). A finished or failed row
    /// pushed again returns to pending; an active row only has its payload
    /// rebound.
    async fn push(&self, job: &SyncJob) -> Result<()>;

    /// Claim up to `limit` pending jobs of a queue in enqueue order,
    /// marking them active and counting the attempt.
    async fn claim_pending(&self, queue: &str, limit: usize) -> Result<Vec<SyncJob>>;

    /// Settle a job that completed successfully.
    async fn mark_finished(&self, id: &str) -> Result<()>;

    /// Settle a job that failed, recording the failure message.
    async fn mark_failed(&self, id: &str, error: &str) -> Result<()>;

    /// Return a claimed job to pending (prerequisite-ordering retry).
    async fn requeue(&self, id: &str) -> Result<()>;

    /// Reset jobs left active by an interrupted process back to pending.
    /// Returns the number of rows recovered.
    async fn reset_interrupted(&self, queue: &str) -> Result<u64>;

    /// Number of pending jobs in a queue.
    async fn pending_count(&self, queue: &str) -> Result<u64>;

    /// Look up a job by id.
    async fn find(&self, id: &str) -> Result<Option<SyncJob>>;
}

/// Persistence for operation reports and their items.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn create_report(&self, report: &OperationReport) -> Result<()>;

    /// Append a pending item to a report.
    async fn create_item(&self, item: &OperationReportItem) -> Result<()>;

    /// Complete an item with its outcome. Completion is one-shot: an item
    /// already completed is left untouched.
    async fn complete_item(&self, item_id: &str, success: bool, message: &str) -> Result<()>;

    async fn find_report(&self, id: &str) -> Result<Option<OperationReport>>;

    async fn find_item(&self, item_id: &str) -> Result<Option<OperationReportItem>>;

    /// Progress counts computed over the report's items.
    async fn summary(&self, report_id: &str) -> Result<OperationReportSummary>;
}
