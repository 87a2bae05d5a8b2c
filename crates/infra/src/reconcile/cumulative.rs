//! Cumulative delivered-quantity synchronization.
//!
//! Lists every ERP agreement, sums cumulative quantity per composite sap id
//! across all of an agreement's lines for a given item group (one local
//! contract's delivered quantity may be the sum of several ERP lines), then
//! applies the sums to local contracts. Local contracts whose sap id has no
//! ERP counterpart are reported as misses without failing the batch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use coopsync_core::entity_ports::ContractRepository;
use coopsync_core::erp_ports::AgreementsApi;
use coopsync_core::time::Clock;
use coopsync_domain::{contract_sap_id, Result, SyncJob};
use tracing::{debug, warn};

use crate::queue::{JobProcessor, TaskOutcome};

/// Task applying ERP cumulative quantities to local contracts. Runs as a
/// single job per batch.
pub struct CumulativeQuantitySyncTask {
    agreements: Arc<dyn AgreementsApi>,
    contracts: Arc<dyn ContractRepository>,
    clock: Arc<dyn Clock>,
}

impl CumulativeQuantitySyncTask {
    pub fn new(
        agreements: Arc<dyn AgreementsApi>,
        contracts: Arc<dyn ContractRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { agreements, contracts, clock }
    }

    fn fallback_year(&self) -> i32 {
        chrono::DateTime::from_timestamp(self.clock.now(), 0)
            .map(|dt| dt.year())
            .unwrap_or(1970)
    }
}

#[async_trait]
impl JobProcessor for CumulativeQuantitySyncTask {
    async fn process(&self, _job: &SyncJob) -> Result<TaskOutcome> {
        let agreements = self.agreements.list_agreements().await?;

        // Sum per composite sap id; several lines of one agreement can
        // share an item group.
        let mut sums: HashMap<String, f64> = HashMap::new();
        for agreement in &agreements {
            let Some(doc_num) = agreement.doc_num else {
                warn!(bp_code = %agreement.bp_code, "skipping agreement without document number");
                continue;
            };
            let year = agreement
                .start_date
                .as_deref()
                .and_then(|date| date.get(..4))
                .and_then(|year| year.parse::<i32>().ok())
                .unwrap_or_else(|| self.fallback_year());

            for line in &agreement.lines {
                let key = contract_sap_id(year, doc_num, &line.item_group_code);
                *sums.entry(key).or_insert(0.0) += line.cumulative_quantity.unwrap_or(0.0);
            }
        }

        let mut updated = 0usize;
        let mut misses: Vec<String> = Vec::new();

        for mut contract in self.contracts.list_with_sap_ids().await? {
            let Some(sap_id) = contract.sap_id.clone() else { continue };
            match sums.get(&sap_id) {
                Some(total) => {
                    if (contract.delivered_quantity - *total).abs() > f64::EPSILON {
                        contract.delivered_quantity = *total;
                        contract.updated_at = self.clock.now();
                        self.contracts.update(&contract).await?;
                        updated += 1;
                    }
                }
                None => misses.push(sap_id),
            }
        }

        debug!(updated, misses = misses.len(), "cumulative quantities applied");

        let message = if misses.is_empty() {
            format!("cumulative quantities applied to {updated} contracts")
        } else {
            format!(
                "cumulative quantities applied to {updated} contracts; no ERP match for: {}",
                misses.join(", ")
            )
        };
        Ok(TaskOutcome::Success { message })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use coopsync_domain::{
        Contract, ContractStatus, ErpAgreement, ErpAgreementLine, ErpAgreementStatus,
    };

    use super::*;
    use crate::reconcile::support::{MemoryAgreementsApi, MemoryContracts};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> i64 {
            1_735_700_000
        }
    }

    fn agreement_with_lines(doc_num: i64, lines: &[(&str, f64)]) -> ErpAgreement {
        ErpAgreement {
            agreement_no: Some(doc_num),
            doc_num: Some(doc_num),
            bp_code: "C-100".into(),
            start_date: Some("2025-01-01".into()),
            end_date: None,
            signing_date: None,
            status: ErpAgreementStatus::Approved,
            delivery_place_code: None,
            lines: lines
                .iter()
                .map(|(code, cumulative)| ErpAgreementLine {
                    item_group_code: (*code).to_string(),
                    planned_quantity: None,
                    cumulative_quantity: Some(*cumulative),
                })
                .collect(),
            planned_quantities: BTreeMap::new(),
        }
    }

    fn contract_with(sap_id: &str, delivered: f64) -> Contract {
        Contract {
            id: format!("c-{sap_id}"),
            sap_id: Some(sap_id.to_string()),
            user_id: "u-1".into(),
            item_group_id: "group-103".into(),
            delivery_place_id: "place-1".into(),
            year: 2025,
            status: ContractStatus::Approved,
            contract_quantity: 500.0,
            delivered_quantity: delivered,
            proposed_quantity: None,
            quantity_comment: None,
            reject_comment: None,
            area_details: None,
            start_date: None,
            end_date: None,
            sign_date: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn sync_job() -> SyncJob {
        SyncJob::new("cumulative-sync", "cumulative-sync", "{}".into(), None, 0)
    }

    #[tokio::test]
    async fn sums_multiple_lines_of_the_same_item_group() {
        let agreements = Arc::new(MemoryAgreementsApi::with_agreements(vec![
            agreement_with_lines(4711, &[("103", 100.0), ("103", 50.0), ("104", 30.0)]),
        ]));
        let contracts = Arc::new(MemoryContracts::with_contracts(vec![
            contract_with("2025-4711-103", 0.0),
            contract_with("2025-4711-104", 0.0),
        ]));
        let task =
            CumulativeQuantitySyncTask::new(agreements, contracts.clone(), Arc::new(FixedClock));

        let outcome = task.process(&sync_job()).await.expect("runs");

        assert!(matches!(outcome, TaskOutcome::Success { .. }));
        assert_eq!(
            contracts.by_sap_id("2025-4711-103").expect("contract").delivered_quantity,
            150.0
        );
        assert_eq!(
            contracts.by_sap_id("2025-4711-104").expect("contract").delivered_quantity,
            30.0
        );
    }

    #[tokio::test]
    async fn unmatched_local_contracts_are_reported_not_failed() {
        let agreements = Arc::new(MemoryAgreementsApi::with_agreements(vec![
            agreement_with_lines(4711, &[("103", 100.0)]),
        ]));
        let contracts = Arc::new(MemoryContracts::with_contracts(vec![
            contract_with("2025-4711-103", 0.0),
            contract_with("2025-9999-105", 10.0),
        ]));
        let task =
            CumulativeQuantitySyncTask::new(agreements, contracts.clone(), Arc::new(FixedClock));

        let outcome = task.process(&sync_job()).await.expect("runs");

        match outcome {
            TaskOutcome::Success { message } => {
                assert!(message.contains("2025-9999-105"));
            }
            other => panic!("expected success with miss report, got {:?}", other),
        }
        // The unmatched contract keeps its local value.
        assert_eq!(
            contracts.by_sap_id("2025-9999-105").expect("contract").delivered_quantity,
            10.0
        );
    }

    #[tokio::test]
    async fn unchanged_quantities_are_not_rewritten() {
        let agreements = Arc::new(MemoryAgreementsApi::with_agreements(vec![
            agreement_with_lines(4711, &[("103", 150.0)]),
        ]));
        let contracts = Arc::new(MemoryContracts::with_contracts(vec![contract_with(
            "2025-4711-103",
            150.0,
        )]));
        let task =
            CumulativeQuantitySyncTask::new(agreements, contracts.clone(), Arc::new(FixedClock));

        task.process(&sync_job()).await.expect("runs");

        // updated_at untouched proves no write happened
        assert_eq!(contracts.by_sap_id("2025-4711-103").expect("contract").updated_at, 0);
    }
}
