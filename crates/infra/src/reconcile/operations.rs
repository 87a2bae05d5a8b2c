//! Batch starters for the reconciliation operations.
//!
//! Every starter follows the same shape: create the operation report first,
//! list the ERP records, append one pending report item per record, and
//! push one job per record with an id derived from the ERP record's own
//! identifier (so re-triggering a batch coalesces onto still-pending jobs
//! instead of duplicating them). The returned report is the handle the
//! REST layer polls for progress.

use std::sync::Arc;

use coopsync_core::erp_ports::{
    AgreementsApi, BusinessPartnersApi, DeliveryPlacesApi, ItemGroupsApi,
};
use coopsync_core::queue_ports::ReportStore;
use coopsync_core::time::Clock;
use coopsync_domain::{
    OperationReport, OperationReportItem, OperationType, Result,
};
use serde::Serialize;
use tracing::{info, warn};

use super::contracts::ContractSyncInput;
use super::push::ContractPushInput;
use crate::queue::QueueHandle;

/// Queue handles the starters push into, one per named queue.
pub struct SyncQueues {
    pub contacts: QueueHandle,
    pub item_groups: QueueHandle,
    pub delivery_places: QueueHandle,
    pub contracts: QueueHandle,
    pub contract_push: QueueHandle,
    pub cumulative: QueueHandle,
}

/// Service starting reconciliation batches against the ERP.
pub struct SyncOperations {
    reports: Arc<dyn ReportStore>,
    clock: Arc<dyn Clock>,
    partners: Arc<dyn BusinessPartnersApi>,
    agreements: Arc<dyn AgreementsApi>,
    item_groups: Arc<dyn ItemGroupsApi>,
    delivery_places: Arc<dyn DeliveryPlacesApi>,
    queues: SyncQueues,
}

impl SyncOperations {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reports: Arc<dyn ReportStore>,
        clock: Arc<dyn Clock>,
        partners: Arc<dyn BusinessPartnersApi>,
        agreements: Arc<dyn AgreementsApi>,
        item_groups: Arc<dyn ItemGroupsApi>,
        delivery_places: Arc<dyn DeliveryPlacesApi>,
        queues: SyncQueues,
    ) -> Self {
        Self { reports, clock, partners, agreements, item_groups, delivery_places, queues }
    }

    /// Start a business-partner (contact) sync batch.
    pub async fn start_contact_sync(&self) -> Result<OperationReport> {
        let report = self.create_report(OperationType::ContactSync).await?;
        let partners = self.partners.list_business_partners().await?;

        let mut enqueued = 0usize;
        for partner in &partners {
            let job_id = format!("contact-{}", partner.card_code);
            self.enqueue(&self.queues.contacts, &report, job_id, partner).await?;
            enqueued += 1;
        }

        info!(report_id = %report.id, enqueued, "contact sync batch enqueued");
        Ok(report)
    }

    /// Start an item-group sync batch.
    pub async fn start_item_group_sync(&self) -> Result<OperationReport> {
        let report = self.create_report(OperationType::ItemGroupSync).await?;
        let groups = self.item_groups.list_item_groups().await?;

        let mut enqueued = 0usize;
        for group in &groups {
            let job_id = format!("item-group-{}", group.number);
            self.enqueue(&self.queues.item_groups, &report, job_id, group).await?;
            enqueued += 1;
        }

        info!(report_id = %report.id, enqueued, "item group sync batch enqueued");
        Ok(report)
    }

    /// Start a delivery-place sync batch.
    pub async fn start_delivery_place_sync(&self) -> Result<OperationReport> {
        let report = self.create_report(OperationType::DeliveryPlaceSync).await?;
        let places = self.delivery_places.list_delivery_places().await?;

        let mut enqueued = 0usize;
        for place in &places {
            let job_id = format!("delivery-place-{}", place.code);
            self.enqueue(&self.queues.delivery_places, &report, job_id, place).await?;
            enqueued += 1;
        }

        info!(report_id = %report.id, enqueued, "delivery place sync batch enqueued");
        Ok(report)
    }

    /// Start a contract pull-sync batch: one job per agreement line, keyed
    /// by the composite sap id so one ERP document fans out into one job
    /// per item group.
    pub async fn start_contract_sync(&self) -> Result<OperationReport> {
        let report = self.create_report(OperationType::ContractSync).await?;
        let agreements = self.agreements.list_agreements().await?;

        let mut enqueued = 0usize;
        for agreement in &agreements {
            let Some(doc_num) = agreement.doc_num else {
                warn!(bp_code = %agreement.bp_code, "skipping agreement without document number");
                continue;
            };

            for line in &agreement.lines {
                let input = ContractSyncInput {
                    agreement: agreement.clone(),
                    item_group_code: line.item_group_code.clone(),
                };
                let job_id = format!("contract-{doc_num}-{}", line.item_group_code);
                self.enqueue(&self.queues.contracts, &report, job_id, &input).await?;
                enqueued += 1;
            }
        }

        info!(report_id = %report.id, enqueued, "contract sync batch enqueued");
        Ok(report)
    }

    /// Start a cumulative-quantity sync run. A single job covers the whole
    /// pass; the stable job id coalesces re-triggered runs.
    pub async fn start_cumulative_sync(&self) -> Result<OperationReport> {
        let report = self.create_report(OperationType::CumulativeSync).await?;
        self.enqueue(
            &self.queues.cumulative,
            &report,
            "cumulative-sync".to_string(),
            &serde_json::json!({}),
        )
        .await?;

        info!(report_id = %report.id, "cumulative sync enqueued");
        Ok(report)
    }

    /// Start a push batch for the given contracts (typically one, triggered
    /// when a member signs or an operator approves a contract).
    pub async fn start_contract_push(
        &self,
        inputs: Vec<ContractPushInput>,
    ) -> Result<OperationReport> {
        let report = self.create_report(OperationType::ContractPush).await?;

        let mut enqueued = 0usize;
        for input in &inputs {
            let job_id = format!("contract-push-{}", input.contract.id);
            self.enqueue(&self.queues.contract_push, &report, job_id, input).await?;
            enqueued += 1;
        }

        info!(report_id = %report.id, enqueued, "contract push batch enqueued");
        Ok(report)
    }

    /// Poll surface for a running batch.
    pub async fn report_summary(
        &self,
        report_id: &str,
    ) -> Result<coopsync_domain::OperationReportSummary> {
        self.reports.summary(report_id).await
    }

    async fn create_report(&self, op_type: OperationType) -> Result<OperationReport> {
        // The report exists before any job referencing it is enqueued.
        let report = OperationReport::new(op_type, self.clock.now());
        self.reports.create_report(&report).await?;
        Ok(report)
    }

    async fn enqueue<T: Serialize>(
        &self,
        queue: &QueueHandle,
        report: &OperationReport,
        job_id: String,
        payload: &T,
    ) -> Result<()> {
        let item = OperationReportItem::pending(&report.id, self.clock.now());
        self.reports.create_item(&item).await?;
        queue.push(job_id, payload, Some(item.id)).await
    }
}

#[cfg(test)]
mod tests {
    use coopsync_core::queue_ports::JobStore;
    use coopsync_domain::constants::{
        QUEUE_CONTACT_SYNC, QUEUE_CONTRACT_PUSH, QUEUE_CONTRACT_SYNC, QUEUE_CUMULATIVE_SYNC,
        QUEUE_DELIVERY_PLACE_SYNC, QUEUE_ITEM_GROUP_SYNC,
    };
    use coopsync_domain::{
        ErpAgreement, ErpAgreementLine, ErpAgreementStatus, ErpBusinessPartner, ErpItemGroup,
    };

    use super::*;
    use crate::queue::{QueueManager, QueueOptions, TaskOutcome};
    use crate::reconcile::support::{
        MemoryAgreementsApi, ScriptedDeliveryPlacesApi, ScriptedItemGroupsApi,
        ScriptedPartnersApi,
    };
    use crate::testing::{MemoryJobStore, MemoryReportStore};

    struct FixedClock;

    impl coopsync_core::time::Clock for FixedClock {
        fn now(&self) -> i64 {
            1_700_000_000
        }
    }

    struct NoopProcessor;

    #[async_trait::async_trait]
    impl crate::queue::JobProcessor for NoopProcessor {
        async fn process(
            &self,
            _job: &coopsync_domain::SyncJob,
        ) -> coopsync_domain::Result<TaskOutcome> {
            Ok(TaskOutcome::Success { message: "ok".into() })
        }
    }

    fn partner(card_code: &str) -> ErpBusinessPartner {
        ErpBusinessPartner {
            card_code: card_code.into(),
            card_name: None,
            email: None,
            phone1: None,
            phone2: None,
            federal_tax_id: None,
            vat_liable: None,
            addresses: vec![],
            bank_accounts: vec![],
        }
    }

    fn agreement(doc_num: i64, groups: &[&str]) -> ErpAgreement {
        ErpAgreement {
            agreement_no: Some(doc_num),
            doc_num: Some(doc_num),
            bp_code: "C-100".into(),
            start_date: Some("2025-01-01".into()),
            end_date: None,
            signing_date: None,
            status: ErpAgreementStatus::Approved,
            delivery_place_code: Some("DP-01".into()),
            lines: groups
                .iter()
                .map(|code| ErpAgreementLine {
                    item_group_code: (*code).to_string(),
                    planned_quantity: Some(100.0),
                    cumulative_quantity: None,
                })
                .collect(),
            planned_quantities: Default::default(),
        }
    }

    struct Fixture {
        operations: SyncOperations,
        jobs: Arc<MemoryJobStore>,
        reports: Arc<MemoryReportStore>,
    }

    fn fixture(
        partners: Vec<ErpBusinessPartner>,
        agreements: Vec<ErpAgreement>,
        groups: Vec<ErpItemGroup>,
    ) -> Fixture {
        let jobs = Arc::new(MemoryJobStore::default());
        let reports = Arc::new(MemoryReportStore::default());
        let clock = Arc::new(FixedClock);

        let mut manager = QueueManager::new(
            jobs.clone() as Arc<dyn JobStore>,
            reports.clone() as Arc<dyn ReportStore>,
            clock.clone() as Arc<dyn coopsync_core::time::Clock>,
        );
        let processor = Arc::new(NoopProcessor);
        let queues = SyncQueues {
            contacts: manager.create_queue(
                QUEUE_CONTACT_SYNC,
                processor.clone(),
                QueueOptions::default(),
            ),
            item_groups: manager.create_queue(
                QUEUE_ITEM_GROUP_SYNC,
                processor.clone(),
                QueueOptions::default(),
            ),
            delivery_places: manager.create_queue(
                QUEUE_DELIVERY_PLACE_SYNC,
                processor.clone(),
                QueueOptions::default(),
            ),
            contracts: manager.create_queue(
                QUEUE_CONTRACT_SYNC,
                processor.clone(),
                QueueOptions::default(),
            ),
            contract_push: manager.create_queue(
                QUEUE_CONTRACT_PUSH,
                processor.clone(),
                QueueOptions::default(),
            ),
            cumulative: manager.create_queue(
                QUEUE_CUMULATIVE_SYNC,
                processor,
                QueueOptions::default(),
            ),
        };

        let operations = SyncOperations::new(
            reports.clone() as Arc<dyn ReportStore>,
            clock,
            Arc::new(ScriptedPartnersApi { partners }),
            Arc::new(MemoryAgreementsApi::with_agreements(agreements)),
            Arc::new(ScriptedItemGroupsApi { groups }),
            Arc::new(ScriptedDeliveryPlacesApi { places: vec![] }),
            queues,
        );

        Fixture { operations, jobs, reports }
    }

    #[tokio::test]
    async fn contact_batch_creates_report_items_and_jobs() {
        let f = fixture(vec![partner("C-100"), partner("C-101")], vec![], vec![]);

        let report = f.operations.start_contact_sync().await.expect("batch starts");

        let items = f.reports.items_of(&report.id);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| !i.completed));

        let jobs = f.jobs.jobs_in(QUEUE_CONTACT_SYNC);
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().any(|j| j.id == "contact-C-100"));
        // Every job points at a report item of this batch.
        assert!(jobs.iter().all(|j| {
            j.report_item_id
                .as_ref()
                .map(|id| items.iter().any(|i| &i.id == id))
                .unwrap_or(false)
        }));
    }

    #[tokio::test]
    async fn contract_batch_fans_out_one_job_per_agreement_line() {
        let f = fixture(vec![], vec![agreement(4711, &["103", "104"])], vec![]);

        let report = f.operations.start_contract_sync().await.expect("batch starts");

        let jobs = f.jobs.jobs_in(QUEUE_CONTRACT_SYNC);
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().any(|j| j.id == "contract-4711-103"));
        assert!(jobs.iter().any(|j| j.id == "contract-4711-104"));
        assert_eq!(f.reports.items_of(&report.id).len(), 2);
    }

    #[tokio::test]
    async fn retriggered_batch_coalesces_on_job_ids() {
        let f = fixture(vec![partner("C-100")], vec![], vec![]);

        f.operations.start_contact_sync().await.expect("first batch");
        f.operations.start_contact_sync().await.expect("second batch");

        // Still a single pending job; the second batch rebound it.
        assert_eq!(f.jobs.jobs_in(QUEUE_CONTACT_SYNC).len(), 1);
    }

    #[tokio::test]
    async fn cumulative_batch_pushes_a_single_stable_job() {
        let f = fixture(vec![], vec![], vec![]);

        f.operations.start_cumulative_sync().await.expect("batch starts");
        let jobs = f.jobs.jobs_in(QUEUE_CUMULATIVE_SYNC);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "cumulative-sync");
    }

    #[tokio::test]
    async fn item_group_batch_enqueues_each_group() {
        let f = fixture(
            vec![],
            vec![],
            vec![
                ErpItemGroup { number: 100, group_name: "FRESH".into() },
                ErpItemGroup { number: 103, group_name: "FROZEN".into() },
            ],
        );

        let report = f.operations.start_item_group_sync().await.expect("batch starts");

        assert_eq!(f.jobs.jobs_in(QUEUE_ITEM_GROUP_SYNC).len(), 2);
        let summary = f.operations.report_summary(&report.id).await.expect("summary");
        assert_eq!(summary.pending_count, 2);
        assert_eq!(summary.success_count, 0);
    }
}
