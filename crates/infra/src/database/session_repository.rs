//! SQLite-backed implementation of the ERP session slot.
//!
//! At most one live session row exists; saving replaces the slot, clearing
//! empties it.

use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::erp_ports::SessionStore;
use coopsync_domain::{ErpSession, Result as DomainResult};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::DbManager;
use super::{map_join_error, map_sql_error};

/// SQLite-backed single-slot session store.
pub struct SqliteSessionStore {
    db: Arc<DbManager>,
}

impl SqliteSessionStore {
    /// Construct a store backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn find(&self) -> DomainResult<Option<ErpSession>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<ErpSession>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare("SELECT session_id, route_id, expires_at FROM erp_session WHERE slot = 0")
                .map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![], map_session_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<ErpSession>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save(&self, session: &ErpSession) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let session = session.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO erp_session (slot, session_id, route_id, expires_at)
                 VALUES (0, ?1, ?2, ?3)
                 ON CONFLICT (slot) DO UPDATE SET
                     session_id = excluded.session_id,
                     route_id = excluded.route_id,
                     expires_at = excluded.expires_at",
                params![session.session_id, session.route_id, session.expires_at],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn clear(&self) -> DomainResult<()> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM erp_session WHERE slot = 0", params![])
                .map(|_| ())
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_session_row(row: &Row<'_>) -> rusqlite::Result<ErpSession> {
    Ok(ErpSession {
        session_id: row.get(0)?,
        route_id: row.get(1)?,
        expires_at: row.get(2)?,
    })
}
