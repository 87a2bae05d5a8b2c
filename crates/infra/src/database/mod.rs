//! SQLite-backed persistence for queue state, reports, the ERP session slot,
//! and the synchronized business entities.
//!
//! Repositories run every statement on the blocking pool via
//! `tokio::task::spawn_blocking` and convert driver errors with
//! [`map_sql_error`], which covers the failure modes this schema can
//! actually produce: a busy or locked database file, violations of the
//! natural-key constraints (`sap_id` uniqueness, report item foreign key),
//! and lookups that found nothing.

pub mod contract_repository;
pub mod delivery_place_repository;
pub mod item_group_repository;
pub mod job_repository;
pub mod manager;
pub mod report_repository;
pub mod session_repository;

pub use contract_repository::SqliteContractRepository;
pub use delivery_place_repository::SqliteDeliveryPlaceRepository;
pub use item_group_repository::SqliteItemGroupRepository;
pub use job_repository::SqliteJobStore;
pub use manager::DbManager;
pub use report_repository::SqliteReportStore;
pub use session_repository::SqliteSessionStore;

use coopsync_domain::CoopsyncError;
use tokio::task;

pub(crate) fn map_sql_error(err: rusqlite::Error) -> CoopsyncError {
    use rusqlite::ffi::ErrorCode;

    match err {
        rusqlite::Error::QueryReturnedNoRows => {
            CoopsyncError::NotFound("no rows returned by query".into())
        }
        rusqlite::Error::SqliteFailure(code, message) => {
            let detail = message.unwrap_or_else(|| code.to_string());
            match code.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    CoopsyncError::Database(format!("database unavailable: {detail}"))
                }
                ErrorCode::ConstraintViolation => {
                    CoopsyncError::Database(format!("constraint violation: {detail}"))
                }
                _ => CoopsyncError::Database(detail),
            }
        }
        other => CoopsyncError::Database(other.to_string()),
    }
}

pub(crate) fn map_pool_error(err: r2d2::Error) -> CoopsyncError {
    CoopsyncError::Database(format!("connection pool error: {err}"))
}

pub(crate) fn map_join_error(err: task::JoinError) -> CoopsyncError {
    if err.is_cancelled() {
        CoopsyncError::Internal("database task cancelled".into())
    } else {
        CoopsyncError::Internal(format!("database task panic: {err}"))
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64) -> bool {
    value != 0
}

pub(crate) fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    // Drive the mapping through a real database instead of hand-built
    // driver errors, so the match arms stay tied to failures the schema
    // can produce.
    #[test]
    fn duplicate_natural_key_maps_to_constraint_violation() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch("CREATE TABLE delivery_places (sap_id TEXT NOT NULL UNIQUE)")
            .expect("schema");
        conn.execute("INSERT INTO delivery_places (sap_id) VALUES ('DP-01')", [])
            .expect("first insert");

        let err = conn
            .execute("INSERT INTO delivery_places (sap_id) VALUES ('DP-01')", [])
            .expect_err("duplicate sap_id must be rejected");

        match map_sql_error(err) {
            CoopsyncError::Database(msg) => assert!(msg.contains("constraint")),
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn empty_lookup_maps_to_not_found() {
        let conn = Connection::open_in_memory().expect("in-memory db");

        let err = conn
            .query_row("SELECT 1 WHERE 1 = 0", [], |row| row.get::<_, i64>(0))
            .expect_err("no row to return");

        assert!(matches!(map_sql_error(err), CoopsyncError::NotFound(_)));
    }

    #[test]
    fn malformed_sql_maps_to_database_error() {
        let conn = Connection::open_in_memory().expect("in-memory db");

        let err = conn
            .execute("INSERT INTO missing_table DEFAULT VALUES", [])
            .expect_err("table does not exist");

        assert!(matches!(map_sql_error(err), CoopsyncError::Database(_)));
    }
}
