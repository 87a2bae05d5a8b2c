//! SQLite-backed implementation of the report store port.
//!
//! Summary counts are computed over item flags at read time; there are no
//! counter columns to drift out of sync.

use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::queue_ports::ReportStore;
use coopsync_domain::{
    CoopsyncError, OperationReport, OperationReportItem, OperationReportSummary,
    Result as DomainResult,
};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::manager::DbManager;
use super::{bool_to_int, int_to_bool, map_join_error, map_sql_error};

/// SQLite-backed report store.
pub struct SqliteReportStore {
    db: Arc<DbManager>,
}

impl SqliteReportStore {
    /// Construct a store backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn summary_row(conn: &Connection, report_id: &str) -> DomainResult<OperationReportSummary> {
        let report = Self::report_row(conn, report_id)?.ok_or_else(|| {
            CoopsyncError::NotFound(format!("operation report {report_id} does not exist"))
        })?;

        conn.query_row(REPORT_SUMMARY_SQL, params![report_id], |row| {
            Ok(OperationReportSummary {
                id: report.id.clone(),
                op_type: report.op_type.to_string(),
                started: report.created_at,
                pending_count: row.get::<_, i64>(0)?.max(0) as u32,
                failed_count: row.get::<_, i64>(1)?.max(0) as u32,
                success_count: row.get::<_, i64>(2)?.max(0) as u32,
            })
        })
        .map_err(map_sql_error)
    }

    fn report_row(conn: &Connection, id: &str) -> DomainResult<Option<OperationReport>> {
        let mut stmt = conn
            .prepare("SELECT id, op_type, created_at FROM operation_reports WHERE id = ?1")
            .map_err(map_sql_error)?;
        let mut rows = stmt
            .query_map(params![id], map_report_row)
            .map_err(map_sql_error)?
            .collect::<rusqlite::Result<Vec<OperationReport>>>()
            .map_err(map_sql_error)?;
        Ok(rows.pop())
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn create_report(&self, report: &OperationReport) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let report = report.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO operation_reports (id, op_type, created_at) VALUES (?1, ?2, ?3)",
                params![report.id, report.op_type.to_string(), report.created_at],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn create_item(&self, item: &OperationReportItem) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let item = item.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO operation_report_items (id, report_id, message, completed, success, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    item.id,
                    item.report_id,
                    item.message,
                    bool_to_int(item.completed),
                    bool_to_int(item.success),
                    item.created_at,
                ],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn complete_item(&self, item_id: &str, success: bool, message: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let item_id = item_id.to_string();
        let message = message.to_string();

        // One-shot completion: the predicate leaves already-completed items
        // untouched.
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE operation_report_items
                 SET completed = 1, success = ?2, message = ?3
                 WHERE id = ?1 AND completed = 0",
                params![item_id, bool_to_int(success), message],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_report(&self, id: &str) -> DomainResult<Option<OperationReport>> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<OperationReport>> {
            let conn = db.get_connection()?;
            Self::report_row(&conn, &id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_item(&self, item_id: &str) -> DomainResult<Option<OperationReportItem>> {
        let db = Arc::clone(&self.db);
        let item_id = item_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<OperationReportItem>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, report_id, message, completed, success, created_at
                     FROM operation_report_items WHERE id = ?1",
                )
                .map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![item_id], map_item_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<OperationReportItem>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn summary(&self, report_id: &str) -> DomainResult<OperationReportSummary> {
        let db = Arc::clone(&self.db);
        let report_id = report_id.to_string();

        task::spawn_blocking(move || -> DomainResult<OperationReportSummary> {
            let conn = db.get_connection()?;
            Self::summary_row(&conn, &report_id)
        })
        .await
        .map_err(map_join_error)?
    }
}

const REPORT_SUMMARY_SQL: &str = "SELECT
        COALESCE(SUM(CASE WHEN completed = 0 THEN 1 ELSE 0 END), 0),
        COALESCE(SUM(CASE WHEN completed = 1 AND success = 0 THEN 1 ELSE 0 END), 0),
        COALESCE(SUM(CASE WHEN completed = 1 AND success = 1 THEN 1 ELSE 0 END), 0)
    FROM operation_report_items
    WHERE report_id = ?1";

fn map_report_row(row: &Row<'_>) -> rusqlite::Result<OperationReport> {
    let op_type_raw: String = row.get(1)?;
    let op_type = op_type_raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;

    Ok(OperationReport { id: row.get(0)?, op_type, created_at: row.get(2)? })
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<OperationReportItem> {
    Ok(OperationReportItem {
        id: row.get(0)?,
        report_id: row.get(1)?,
        message: row.get(2)?,
        completed: int_to_bool(row.get(3)?),
        success: int_to_bool(row.get(4)?),
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use coopsync_domain::OperationType;
    use tempfile::TempDir;

    use super::*;

    async fn setup_store() -> (SqliteReportStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("manager created");
        manager.run_migrations().expect("migrations applied");
        let store = SqliteReportStore::new(Arc::new(manager));

        (store, temp_dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn summary_counts_items_by_flags() {
        let (store, _temp_dir) = setup_store().await;

        let report = OperationReport::new(OperationType::ContactSync, 1_000);
        store.create_report(&report).await.expect("report created");

        let items: Vec<_> =
            (0..4).map(|_| OperationReportItem::pending(&report.id, 1_000)).collect();
        for item in &items {
            store.create_item(item).await.expect("item created");
        }

        store.complete_item(&items[0].id, true, "ok").await.expect("complete");
        store.complete_item(&items[1].id, false, "missing user").await.expect("complete");

        let summary = store.summary(&report.id).await.expect("summary");
        assert_eq!(summary.pending_count, 2);
        assert_eq!(summary.failed_count, 1);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.started, 1_000);
        assert_eq!(summary.op_type, "contact-sync");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn complete_item_is_one_shot() {
        let (store, _temp_dir) = setup_store().await;

        let report = OperationReport::new(OperationType::ItemGroupSync, 1_000);
        store.create_report(&report).await.expect("report created");
        let item = OperationReportItem::pending(&report.id, 1_000);
        store.create_item(&item).await.expect("item created");

        store.complete_item(&item.id, false, "first outcome").await.expect("complete");
        // A second completion attempt must not overwrite the first outcome.
        store.complete_item(&item.id, true, "second outcome").await.expect("complete");

        let stored = store.find_item(&item.id).await.expect("find").expect("exists");
        assert!(stored.completed);
        assert!(!stored.success);
        assert_eq!(stored.message.as_deref(), Some("first outcome"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn summary_for_unknown_report_is_not_found() {
        let (store, _temp_dir) = setup_store().await;

        let err = store.summary("missing").await.expect_err("must fail");
        assert!(matches!(err, CoopsyncError::NotFound(_)));
    }
}
