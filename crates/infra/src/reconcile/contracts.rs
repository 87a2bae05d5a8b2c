//! Contract synchronization, pull direction (ERP → local).
//!
//! One job per agreement line. The composite sap id `"{year}-{docNum}-
//! {itemGroupCode}"` correlates the line to exactly one local contract:
//! missing contracts are created seeded from the ERP record, existing ones
//! have their ERP-owned fields (dates, quantities, status) overwritten
//! while user-editable fields (comments, proposed-quantity override,
//! reject/area details) are preserved. A merge, not an overwrite.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use coopsync_core::directory_ports::UserDirectory;
use coopsync_core::entity_ports::{
    ContractRepository, DeliveryPlaceRepository, ItemGroupRepository,
};
use coopsync_core::time::Clock;
use coopsync_domain::{
    contract_sap_id, user_attributes, Contract, ContractStatus, ErpAgreement,
    ErpAgreementStatus, Result, SyncJob,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::queue::{JobProcessor, TaskOutcome};

/// Payload of one contract-sync job: the agreement plus the line this job
/// is responsible for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSyncInput {
    pub agreement: ErpAgreement,
    pub item_group_code: String,
}

/// Task syncing one agreement line into a local contract.
pub struct ContractSyncTask {
    contracts: Arc<dyn ContractRepository>,
    item_groups: Arc<dyn ItemGroupRepository>,
    delivery_places: Arc<dyn DeliveryPlaceRepository>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
}

impl ContractSyncTask {
    pub fn new(
        contracts: Arc<dyn ContractRepository>,
        item_groups: Arc<dyn ItemGroupRepository>,
        delivery_places: Arc<dyn DeliveryPlaceRepository>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { contracts, item_groups, delivery_places, users, clock }
    }
}

#[async_trait]
impl JobProcessor for ContractSyncTask {
    async fn process(&self, job: &SyncJob) -> Result<TaskOutcome> {
        let input: ContractSyncInput = job.payload()?;
        let agreement = &input.agreement;
        let group_code = &input.item_group_code;

        let Some(doc_num) = agreement.doc_num else {
            return Ok(TaskOutcome::Failure {
                message: format!(
                    "agreement for partner {} carries no document number",
                    agreement.bp_code
                ),
            });
        };

        // Resolve the correlated local records; each miss is a
        // human-actionable failure, not a retry.
        let Some(place_code) = agreement.delivery_place_code.as_deref() else {
            return Ok(TaskOutcome::Failure {
                message: format!("agreement {doc_num} carries no delivery place code"),
            });
        };
        let Some(place) = self.delivery_places.find_by_sap_id(place_code).await? else {
            return Ok(TaskOutcome::Failure {
                message: format!("delivery place {place_code} of agreement {doc_num} is not synchronized"),
            });
        };
        let Some(group) = self.item_groups.find_by_sap_id(group_code).await? else {
            return Ok(TaskOutcome::Failure {
                message: format!("item group {group_code} of agreement {doc_num} is not synchronized"),
            });
        };
        let Some(user) = self
            .users
            .find_user_by_attribute(user_attributes::SAP_ID, &agreement.bp_code)
            .await?
        else {
            return Ok(TaskOutcome::Failure {
                message: format!(
                    "no local user for business partner {} of agreement {doc_num}",
                    agreement.bp_code
                ),
            });
        };

        let Some(line) = agreement.lines.iter().find(|l| &l.item_group_code == group_code)
        else {
            return Ok(TaskOutcome::Failure {
                message: format!("agreement {doc_num} has no line for item group {group_code}"),
            });
        };

        let year = agreement_year(agreement, &*self.clock);
        let sap_id = contract_sap_id(year, doc_num, group_code);

        let contract_quantity = line
            .planned_quantity
            .or_else(|| agreement.planned_quantities.get(group_code).copied())
            .unwrap_or(0.0);
        let delivered_quantity = line.cumulative_quantity.unwrap_or(0.0);
        let status = map_status(agreement.status);
        let now = self.clock.now();

        match self.contracts.find_by_sap_id(&sap_id).await? {
            None => {
                let contract = Contract {
                    id: Uuid::new_v4().to_string(),
                    sap_id: Some(sap_id.clone()),
                    user_id: user.id,
                    item_group_id: group.id,
                    delivery_place_id: place.id,
                    year,
                    status,
                    contract_quantity,
                    delivered_quantity,
                    proposed_quantity: None,
                    quantity_comment: None,
                    reject_comment: None,
                    area_details: None,
                    start_date: agreement.start_date.clone(),
                    end_date: agreement.end_date.clone(),
                    sign_date: agreement.signing_date.clone(),
                    created_at: now,
                    updated_at: now,
                };
                self.contracts.insert(&contract).await?;
                debug!(sap_id = %sap_id, "contract created from agreement line");
            }
            Some(existing) => {
                // ERP-owned fields only; the member's edits survive.
                let merged = Contract {
                    status,
                    contract_quantity,
                    delivered_quantity,
                    start_date: agreement.start_date.clone(),
                    end_date: agreement.end_date.clone(),
                    sign_date: agreement.signing_date.clone(),
                    updated_at: now,
                    ..existing
                };
                self.contracts.update(&merged).await?;
                debug!(sap_id = %sap_id, "contract merged from agreement line");
            }
        }

        Ok(TaskOutcome::Success { message: format!("contract {sap_id} synchronized") })
    }
}

/// Contract year of an agreement: taken from the start date, falling back
/// to the current year.
fn agreement_year(agreement: &ErpAgreement, clock: &dyn Clock) -> i32 {
    agreement
        .start_date
        .as_deref()
        .and_then(|date| date.get(..4))
        .and_then(|year| year.parse::<i32>().ok())
        .unwrap_or_else(|| {
            chrono::DateTime::from_timestamp(clock.now(), 0)
                .map(|dt| dt.year())
                .unwrap_or(1970)
        })
}

fn map_status(status: ErpAgreementStatus) -> ContractStatus {
    match status {
        ErpAgreementStatus::Approved => ContractStatus::Approved,
        ErpAgreementStatus::OnHold => ContractStatus::OnHold,
        ErpAgreementStatus::Draft => ContractStatus::Draft,
        ErpAgreementStatus::Terminated => ContractStatus::Terminated,
    }
}
