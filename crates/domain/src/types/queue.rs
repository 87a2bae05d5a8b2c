//! Persistent sync-job model.
//!
//! Jobs are owned exclusively by the queue manager and live in the
//! `sync_jobs` table so that an interrupted process resumes pending work on
//! restart. Job identity is application-supplied; for ERP-record jobs it is
//! derived from the ERP record's own identifier, which makes re-enqueuing
//! the same record an update of the pending row rather than a duplicate.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{CoopsyncError, Result};

/// Lifecycle state of a [`SyncJob`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Active,
    Finished,
    Failed,
}

crate::impl_domain_status_conversions!(JobStatus {
    Pending => "pending",
    Active => "active",
    Finished => "finished",
    Failed => "failed",
});

/// One unit of reconciliation work in a named queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncJob {
    pub id: String,
    pub queue: String,
    pub payload_json: String,
    pub status: JobStatus,
    pub attempts: i64,
    /// Report item this job settles when it reaches a terminal outcome.
    pub report_item_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SyncJob {
    /// Build a pending job carrying an already-serialized payload.
    pub fn new(
        queue: impl Into<String>,
        id: impl Into<String>,
        payload_json: String,
        report_item_id: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            payload_json,
            status: JobStatus::Pending,
            attempts: 0,
            report_item_id,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deserialize the payload into the task's input type.
    ///
    /// # Errors
    /// Returns `CoopsyncError::InvalidInput` when the stored JSON does not
    /// match the expected shape.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.payload_json).map_err(|e| {
            CoopsyncError::InvalidInput(format!(
                "job {} carries an unreadable payload: {e}",
                self.id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn status_roundtrips_through_strings() {
        for status in [JobStatus::Pending, JobStatus::Active, JobStatus::Finished, JobStatus::Failed]
        {
            assert_eq!(JobStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }

    #[test]
    fn new_job_starts_pending_with_zero_attempts() {
        let job = SyncJob::new("contact-sync", "bp-100", "{}".into(), None, 1_700_000_000);

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.queue, "contact-sync");
    }

    #[test]
    fn payload_surfaces_parse_failures_with_job_id() {
        let job =
            SyncJob::new("contact-sync", "bp-77", "{not json".into(), None, 1_700_000_000);

        let err = job.payload::<serde_json::Value>().unwrap_err();
        assert!(err.to_string().contains("bp-77"));
    }
}
