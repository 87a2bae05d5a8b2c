//! SQLite-backed implementation of the delivery place repository port.

use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::entity_ports::DeliveryPlaceRepository;
use coopsync_domain::{DeliveryPlace, Result as DomainResult};
use rusqlite::{params, Row};
use tokio::task;

use super::manager::DbManager;
use super::{map_join_error, map_sql_error};

/// SQLite-backed delivery place repository.
pub struct SqliteDeliveryPlaceRepository {
    db: Arc<DbManager>,
}

impl SqliteDeliveryPlaceRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DeliveryPlaceRepository for SqliteDeliveryPlaceRepository {
    async fn find_by_sap_id(&self, sap_id: &str) -> DomainResult<Option<DeliveryPlace>> {
        let db = Arc::clone(&self.db);
        let sap_id = sap_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<DeliveryPlace>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, sap_id, name, created_at, updated_at
                     FROM delivery_places WHERE sap_id = ?1",
                )
                .map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![sap_id], map_place_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<DeliveryPlace>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn insert(&self, place: &DeliveryPlace) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let place = place.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "INSERT INTO delivery_places (id, sap_id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![place.id, place.sap_id, place.name, place.created_at, place.updated_at],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, place: &DeliveryPlace) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let place = place.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE delivery_places SET name = ?2, updated_at = ?3 WHERE id = ?1",
                params![place.id, place.name, place.updated_at],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_place_row(row: &Row<'_>) -> rusqlite::Result<DeliveryPlace> {
    Ok(DeliveryPlace {
        id: row.get(0)?,
        sap_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}
