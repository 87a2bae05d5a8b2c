//! SQLite-backed implementation of the item group repository port.

use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::entity_ports::ItemGroupRepository;
use coopsync_domain::{ItemGroup, ItemGroupCategory, Result as DomainResult};
use rusqlite::{params, Connection, Row};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use super::{map_join_error, map_sql_error};

/// SQLite-backed item group repository.
pub struct SqliteItemGroupRepository {
    db: Arc<DbManager>,
}

impl SqliteItemGroupRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn find(conn: &Connection, sap_id: &str) -> DomainResult<Option<ItemGroup>> {
        let mut stmt = conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE sap_id = ?1"))
            .map_err(map_sql_error)?;
        let mut rows = stmt
            .query_map(params![sap_id], map_group_row)
            .map_err(map_sql_error)?
            .collect::<rusqlite::Result<Vec<ItemGroup>>>()
            .map_err(map_sql_error)?;
        Ok(rows.pop())
    }
}

#[async_trait]
impl ItemGroupRepository for SqliteItemGroupRepository {
    async fn find_by_sap_id(&self, sap_id: &str) -> DomainResult<Option<ItemGroup>> {
        let db = Arc::clone(&self.db);
        let sap_id = sap_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<ItemGroup>> {
            let conn = db.get_connection()?;
            Self::find(&conn, &sap_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn upsert(&self, group: &ItemGroup) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let group = group.clone();

        // Natural key is sap_id: an existing row keeps its local id and
        // created_at, so repeated synchronization adds zero rows.
        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                GROUP_UPSERT_SQL,
                params![
                    group.id,
                    group.sap_id,
                    group.name,
                    group.display_name,
                    group.category.map(|c| category_to_str(&c)),
                    group.minimum_profit_estimation,
                    group.prerequisite_item_group_id,
                    group.created_at,
                    group.updated_at,
                ],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

const GROUP_SELECT_SQL: &str = "SELECT
        id, sap_id, name, display_name, category, minimum_profit_estimation,
        prerequisite_item_group_id, created_at, updated_at
    FROM item_groups";

const GROUP_UPSERT_SQL: &str = "INSERT INTO item_groups (
        id, sap_id, name, display_name, category, minimum_profit_estimation,
        prerequisite_item_group_id, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT (sap_id) DO UPDATE SET
        name = excluded.name,
        display_name = excluded.display_name,
        category = excluded.category,
        minimum_profit_estimation = excluded.minimum_profit_estimation,
        prerequisite_item_group_id = excluded.prerequisite_item_group_id,
        updated_at = excluded.updated_at";

fn category_to_str(category: &ItemGroupCategory) -> &'static str {
    match category {
        ItemGroupCategory::Frozen => "frozen",
        ItemGroupCategory::Fresh => "fresh",
    }
}

fn map_group_row(row: &Row<'_>) -> rusqlite::Result<ItemGroup> {
    let id: String = row.get(0)?;
    let category_raw: Option<String> = row.get(4)?;
    let category = category_raw.as_deref().and_then(|raw| parse_category(&id, raw));

    Ok(ItemGroup {
        id,
        sap_id: row.get(1)?,
        name: row.get(2)?,
        display_name: row.get(3)?,
        category,
        minimum_profit_estimation: row.get(5)?,
        prerequisite_item_group_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn parse_category(id: &str, raw: &str) -> Option<ItemGroupCategory> {
    match raw {
        "frozen" => Some(ItemGroupCategory::Frozen),
        "fresh" => Some(ItemGroupCategory::Fresh),
        other => {
            warn!(
                item_group_id = %id,
                raw_category = %other,
                "unknown item group category returned by sqlite"
            );
            None
        }
    }
}
