//! SQLite-backed implementation of the contract repository port.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::entity_ports::ContractRepository;
use coopsync_domain::{Contract, ContractStatus, Result as DomainResult};
use rusqlite::{params, Connection, Row};
use tokio::task;
use tracing::warn;

use super::manager::DbManager;
use super::{map_join_error, map_sql_error};

/// SQLite-backed contract repository.
pub struct SqliteContractRepository {
    db: Arc<DbManager>,
}

impl SqliteContractRepository {
    /// Construct a repository backed by the shared database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn write(conn: &Connection, sql: &str, contract: &Contract) -> DomainResult<()> {
        conn.execute(
            sql,
            params![
                contract.id,
                contract.sap_id,
                contract.user_id,
                contract.item_group_id,
                contract.delivery_place_id,
                contract.year,
                contract.status.to_string(),
                contract.contract_quantity,
                contract.delivered_quantity,
                contract.proposed_quantity,
                contract.quantity_comment,
                contract.reject_comment,
                contract.area_details,
                contract.start_date,
                contract.end_date,
                contract.sign_date,
                contract.created_at,
                contract.updated_at,
            ],
        )
        .map(|_| ())
        .map_err(map_sql_error)
    }
}

#[async_trait]
impl ContractRepository for SqliteContractRepository {
    async fn find_by_sap_id(&self, sap_id: &str) -> DomainResult<Option<Contract>> {
        let db = Arc::clone(&self.db);
        let sap_id = sap_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Contract>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!("{CONTRACT_SELECT_SQL} WHERE sap_id = ?1"))
                .map_err(map_sql_error)?;
            let mut rows = stmt
                .query_map(params![sap_id], map_contract_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<Contract>>>()
                .map_err(map_sql_error)?;
            Ok(rows.pop())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn insert(&self, contract: &Contract) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let contract = contract.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            Self::write(&conn, CONTRACT_INSERT_SQL, &contract)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, contract: &Contract) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let contract = contract.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            Self::write(&conn, CONTRACT_UPDATE_SQL, &contract)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_with_sap_ids(&self) -> DomainResult<Vec<Contract>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Contract>> {
            let conn = db.get_connection()?;
            let mut stmt = conn
                .prepare(&format!("{CONTRACT_SELECT_SQL} WHERE sap_id IS NOT NULL"))
                .map_err(map_sql_error)?;
            let result = stmt
                .query_map(params![], map_contract_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<Contract>>>()
                .map_err(map_sql_error);
            result
        })
        .await
        .map_err(map_join_error)?
    }
}

const CONTRACT_SELECT_SQL: &str = "SELECT
        id, sap_id, user_id, item_group_id, delivery_place_id, year, status,
        contract_quantity, delivered_quantity, proposed_quantity, quantity_comment,
        reject_comment, area_details, start_date, end_date, sign_date,
        created_at, updated_at
    FROM contracts";

const CONTRACT_INSERT_SQL: &str = "INSERT INTO contracts (
        id, sap_id, user_id, item_group_id, delivery_place_id, year, status,
        contract_quantity, delivered_quantity, proposed_quantity, quantity_comment,
        reject_comment, area_details, start_date, end_date, sign_date,
        created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)";

const CONTRACT_UPDATE_SQL: &str = "UPDATE contracts SET
        sap_id = ?2, user_id = ?3, item_group_id = ?4, delivery_place_id = ?5,
        year = ?6, status = ?7, contract_quantity = ?8, delivered_quantity = ?9,
        proposed_quantity = ?10, quantity_comment = ?11, reject_comment = ?12,
        area_details = ?13, start_date = ?14, end_date = ?15, sign_date = ?16,
        created_at = ?17, updated_at = ?18
    WHERE id = ?1";

fn map_contract_row(row: &Row<'_>) -> rusqlite::Result<Contract> {
    let id: String = row.get(0)?;
    let status_raw: String = row.get(6)?;
    let status = parse_status(&id, &status_raw);

    Ok(Contract {
        id,
        sap_id: row.get(1)?,
        user_id: row.get(2)?,
        item_group_id: row.get(3)?,
        delivery_place_id: row.get(4)?,
        year: row.get(5)?,
        status,
        contract_quantity: row.get(7)?,
        delivered_quantity: row.get(8)?,
        proposed_quantity: row.get(9)?,
        quantity_comment: row.get(10)?,
        reject_comment: row.get(11)?,
        area_details: row.get(12)?,
        start_date: row.get(13)?,
        end_date: row.get(14)?,
        sign_date: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn parse_status(id: &str, raw: &str) -> ContractStatus {
    match ContractStatus::from_str(raw) {
        Ok(status) => status,
        Err(err) => {
            warn!(
                contract_id = %id,
                raw_status = %raw,
                error = %err,
                "invalid contract status returned by sqlite - defaulting to draft"
            );
            ContractStatus::Draft
        }
    }
}
