//! SQLite-backed implementation of the job store port.
//!
//! All queues share the `sync_jobs` table; the queue column keeps their
//! dispatchers isolated. Claiming happens inside a transaction so two
//! dispatchers can never mark the same row active.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::queue_ports::JobStore;
use coopsync_core::time::Clock;
use coopsync_domain::{JobStatus, Result as DomainResult, SyncJob};
use rusqlite::{params, Connection, Row};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use super::{map_join_error, map_sql_error, usize_to_i64};

/// SQLite-backed job store.
pub struct SqliteJobStore {
    db: Arc<DbManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteJobStore {
    /// Construct a store backed by the shared database manager.
    pub fn new(db: Arc<DbManager>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn upsert(conn: &Connection, job: &SyncJob) -> DomainResult<()> {
        conn.execute(
            JOB_UPSERT_SQL,
            params![
                job.id,
                job.queue,
                job.payload_json,
                job.status.to_string(),
                job.attempts,
                job.report_item_id,
                job.last_error,
                job.created_at,
                job.updated_at,
            ],
        )
        .map(|_| ())
        .map_err(map_sql_error)
    }

    fn claim(conn: &mut Connection, queue: &str, limit: usize, now: i64) -> DomainResult<Vec<SyncJob>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let tx = conn.transaction().map_err(map_sql_error)?;
        let mut jobs = {
            let mut stmt = tx.prepare(JOB_CLAIM_SELECT_SQL).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![queue, usize_to_i64(limit)], map_job_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<SyncJob>>>()
                .map_err(map_sql_error)?;
            rows
        };

        for job in &mut jobs {
            tx.execute(
                "UPDATE sync_jobs
                 SET status = 'active', attempts = attempts + 1, updated_at = ?2
                 WHERE id = ?1",
                params![job.id, now],
            )
            .map_err(map_sql_error)?;
            job.status = JobStatus::Active;
            job.attempts += 1;
            job.updated_at = now;
        }

        tx.commit().map_err(map_sql_error)?;
        Ok(jobs)
    }

    fn settle(conn: &Connection, id: &str, status: JobStatus, error: Option<&str>, now: i64) -> DomainResult<()> {
        conn.execute(
            "UPDATE sync_jobs
             SET status = ?2, last_error = ?3, updated_at = ?4
             WHERE id = ?1",
            params![id, status.to_string(), error, now],
        )
        .map(|_| ())
        .map_err(map_sql_error)
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn push(&self, job: &SyncJob) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let to_insert = job.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            Self::upsert(&conn, &to_insert)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn claim_pending(&self, queue: &str, limit: usize) -> DomainResult<Vec<SyncJob>> {
        let db = Arc::clone(&self.db);
        let queue = queue.to_string();
        let now = self.clock.now();

        task::spawn_blocking(move || -> DomainResult<Vec<SyncJob>> {
            let mut conn = db.get_connection()?;
            Self::claim(&mut conn, &queue, limit, now)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_finished(&self, id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let now = self.clock.now();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            Self::settle(&conn, &id, JobStatus::Finished, None, now)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_failed(&self, id: &str, error: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let error = error.to_string();
        let now = self.clock.now();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            Self::settle(&conn, &id, JobStatus::Failed, Some(&error), now)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn requeue(&self, id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let now = self.clock.now();

        // Bumping enqueued_at moves the job to the queue tail so a
        // prerequisite-ordering retry runs after the rest of the batch.
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE sync_jobs
                 SET status = 'pending', enqueued_at = ?2, updated_at = ?2
                 WHERE id = ?1",
                params![id, now],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn reset_interrupted(&self, queue: &str) -> DomainResult<u64> {
        let db = Arc::clone(&self.db);
        let queue = queue.to_string();
        let now = self.clock.now();

        task::spawn_blocking(move || -> DomainResult<u64> {
            let conn = db.get_connection()?;
            let recovered = conn
                .execute(
                    "UPDATE sync_jobs
                     SET status = 'pending', updated_at = ?2
                     WHERE queue = ?1 AND status = 'active'",
                    params![queue, now],
                )
                .map_err(map_sql_error)?;
            Ok(recovered as u64)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn pending_count(&self, queue: &str) -> DomainResult<u64> {
        let db = Arc::clone(&self.db);
        let queue = queue.to_string();

        task::spawn_blocking(move || -> DomainResult<u64> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sync_jobs WHERE queue = ?1 AND status = 'pending'",
                    params![queue],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(count.max(0) as u64)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find(&self, id: &str) -> DomainResult<Option<SyncJob>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncJob>> {
            let conn = db.get_connection()?;
            let mut stmt = conn.prepare(JOB_SELECT_BY_ID_SQL).map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![id], map_job_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<SyncJob>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
        .map_err(map_join_error)?
    }
}

// A finished or failed row pushed again returns to pending; an active row
// only has its payload rebound. enqueued_at is preserved on rebind so the
// FIFO position of pending work does not move.
const JOB_UPSERT_SQL: &str = "INSERT INTO sync_jobs (
        id, queue, payload_json, status, attempts, report_item_id, last_error,
        created_at, enqueued_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9)
    ON CONFLICT (id) DO UPDATE SET
        payload_json = excluded.payload_json,
        report_item_id = excluded.report_item_id,
        status = CASE WHEN sync_jobs.status = 'active' THEN 'active' ELSE 'pending' END,
        last_error = NULL,
        updated_at = excluded.updated_at";

const JOB_CLAIM_SELECT_SQL: &str = "SELECT
        id, queue, payload_json, status, attempts, report_item_id, last_error,
        created_at, updated_at
    FROM sync_jobs
    WHERE queue = ?1 AND status = 'pending'
    ORDER BY enqueued_at ASC, rowid ASC
    LIMIT ?2";

const JOB_SELECT_BY_ID_SQL: &str = "SELECT
        id, queue, payload_json, status, attempts, report_item_id, last_error,
        created_at, updated_at
    FROM sync_jobs
    WHERE id = ?1";

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<SyncJob> {
    let id: String = row.get(0)?;
    let status_raw: String = row.get(3)?;
    let status = parse_status(&id, &status_raw);

    Ok(SyncJob {
        id,
        queue: row.get(1)?,
        payload_json: row.get(2)?,
        status,
        attempts: row.get(4)?,
        report_item_id: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn parse_status(id: &str, raw: &str) -> JobStatus {
    match JobStatus::from_str(raw) {
        Ok(status) => status,
        Err(err) => {
            warn!(
                job_id = %id,
                raw_status = %raw,
                error = %err,
                "invalid job status returned by sqlite - defaulting to pending"
            );
            JobStatus::Pending
        }
    }
}
