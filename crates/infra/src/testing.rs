//! Shared in-memory stores for unit tests.
//!
//! These mirror the sqlite semantics the production stores provide:
//! coalescing upsert by job id, FIFO claim, tail-move on requeue, one-shot
//! report item completion.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use coopsync_core::queue_ports::{JobStore, ReportStore};
use coopsync_domain::{
    JobStatus, OperationReport, OperationReportItem, OperationReportSummary,
    Result as DomainResult, SyncJob,
};

/// In-memory job store.
#[derive(Default)]
pub(crate) struct MemoryJobStore {
    pub rows: Mutex<Vec<SyncJob>>,
}

impl MemoryJobStore {
    pub fn job(&self, id: &str) -> Option<SyncJob> {
        self.rows.lock().expect("rows").iter().find(|j| j.id == id).cloned()
    }

    pub fn jobs_in(&self, queue: &str) -> Vec<SyncJob> {
        self.rows
            .lock()
            .expect("rows")
            .iter()
            .filter(|j| j.queue == queue)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn push(&self, job: &SyncJob) -> DomainResult<()> {
        let mut rows = self.rows.lock().expect("rows");
        if let Some(existing) = rows.iter_mut().find(|j| j.id == job.id) {
            existing.payload_json = job.payload_json.clone();
            existing.report_item_id = job.report_item_id.clone();
            if existing.status != JobStatus::Active {
                existing.status = JobStatus::Pending;
            }
        } else {
            rows.push(job.clone());
        }
        Ok(())
    }

    async fn claim_pending(&self, queue: &str, limit: usize) -> DomainResult<Vec<SyncJob>> {
        let mut rows = self.rows.lock().expect("rows");
        let mut claimed = Vec::new();
        for job in rows.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if job.queue == queue && job.status == JobStatus::Pending {
                job.status = JobStatus::Active;
                job.attempts += 1;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_finished(&self, id: &str) -> DomainResult<()> {
        let mut rows = self.rows.lock().expect("rows");
        if let Some(job) = rows.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Finished;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str) -> DomainResult<()> {
        let mut rows = self.rows.lock().expect("rows");
        if let Some(job) = rows.iter_mut().find(|j| j.id == id) {
            job.status = JobStatus::Failed;
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn requeue(&self, id: &str) -> DomainResult<()> {
        let mut rows = self.rows.lock().expect("rows");
        // Move to the tail to mirror the enqueued_at bump.
        if let Some(pos) = rows.iter().position(|j| j.id == id) {
            let mut job = rows.remove(pos);
            job.status = JobStatus::Pending;
            rows.push(job);
        }
        Ok(())
    }

    async fn reset_interrupted(&self, queue: &str) -> DomainResult<u64> {
        let mut rows = self.rows.lock().expect("rows");
        let mut recovered = 0;
        for job in rows.iter_mut() {
            if job.queue == queue && job.status == JobStatus::Active {
                job.status = JobStatus::Pending;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn pending_count(&self, queue: &str) -> DomainResult<u64> {
        let rows = self.rows.lock().expect("rows");
        Ok(rows.iter().filter(|j| j.queue == queue && j.status == JobStatus::Pending).count()
            as u64)
    }

    async fn find(&self, id: &str) -> DomainResult<Option<SyncJob>> {
        Ok(self.job(id))
    }
}

/// In-memory report store recording every completion call.
#[derive(Default)]
pub(crate) struct MemoryReportStore {
    pub reports: Mutex<Vec<OperationReport>>,
    pub items: Mutex<HashMap<String, OperationReportItem>>,
    pub completions: Mutex<Vec<(String, bool, String)>>,
}

impl MemoryReportStore {
    pub fn items_of(&self, report_id: &str) -> Vec<OperationReportItem> {
        self.items
            .lock()
            .expect("items")
            .values()
            .filter(|i| i.report_id == report_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create_report(&self, report: &OperationReport) -> DomainResult<()> {
        self.reports.lock().expect("reports").push(report.clone());
        Ok(())
    }

    async fn create_item(&self, item: &OperationReportItem) -> DomainResult<()> {
        self.items.lock().expect("items").insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn complete_item(&self, item_id: &str, success: bool, message: &str) -> DomainResult<()> {
        let mut items = self.items.lock().expect("items");
        if let Some(item) = items.get_mut(item_id) {
            if item.completed {
                return Ok(());
            }
            item.completed = true;
            item.success = success;
            item.message = Some(message.to_string());
        }
        self.completions.lock().expect("completions").push((
            item_id.to_string(),
            success,
            message.to_string(),
        ));
        Ok(())
    }

    async fn find_report(&self, id: &str) -> DomainResult<Option<OperationReport>> {
        Ok(self.reports.lock().expect("reports").iter().find(|r| r.id == id).cloned())
    }

    async fn find_item(&self, item_id: &str) -> DomainResult<Option<OperationReportItem>> {
        Ok(self.items.lock().expect("items").get(item_id).cloned())
    }

    async fn summary(&self, report_id: &str) -> DomainResult<OperationReportSummary> {
        let report = self
            .reports
            .lock()
            .expect("reports")
            .iter()
            .find(|r| r.id == report_id)
            .cloned()
            .ok_or_else(|| {
                coopsync_domain::CoopsyncError::NotFound(format!(
                    "operation report {report_id} does not exist"
                ))
            })?;

        let items = self.items_of(report_id);
        Ok(OperationReportSummary {
            id: report.id.clone(),
            op_type: report.op_type.to_string(),
            started: report.created_at,
            pending_count: items.iter().filter(|i| !i.completed).count() as u32,
            failed_count: items.iter().filter(|i| i.completed && !i.success).count() as u32,
            success_count: items.iter().filter(|i| i.completed && i.success).count() as u32,
        })
    }
}
