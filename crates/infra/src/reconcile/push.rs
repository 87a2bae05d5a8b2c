//! Contract synchronization, push direction (local → ERP).
//!
//! Translates a local contract into an agreement line on the partner's
//! blanket agreement. An existing agreement is preferred for update in the
//! order APPROVED, ON_HOLD, DRAFT; only when none exists is a new agreement
//! created. The ERP rejects direct edits to an approved agreement, so an
//! APPROVED target is first transitioned ON_HOLD and only then changed —
//! that ordering is load-bearing and must not be collapsed into one call.

use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::erp_ports::AgreementsApi;
use coopsync_domain::{
    Contract, ErpAgreement, ErpAgreementLine, ErpAgreementStatus, Result, SyncJob,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::queue::{JobProcessor, TaskOutcome};

/// Payload of one contract-push job. The batch starter resolves the
/// correlation codes so the task needs no repository lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractPushInput {
    pub contract: Contract,
    pub bp_code: String,
    pub item_group_code: String,
    pub planned_quantity: f64,
}

/// Task pushing one local contract into the partner's blanket agreement.
pub struct ContractPushTask {
    agreements: Arc<dyn AgreementsApi>,
}

impl ContractPushTask {
    pub fn new(agreements: Arc<dyn AgreementsApi>) -> Self {
        Self { agreements }
    }

    /// Pick the agreement to update: APPROVED beats ON_HOLD beats DRAFT.
    fn select_target(agreements: &[ErpAgreement]) -> Option<&ErpAgreement> {
        for status in
            [ErpAgreementStatus::Approved, ErpAgreementStatus::OnHold, ErpAgreementStatus::Draft]
        {
            if let Some(agreement) = agreements.iter().find(|a| a.status == status) {
                return Some(agreement);
            }
        }
        None
    }

    async fn update_existing(
        &self,
        target: &ErpAgreement,
        input: &ContractPushInput,
    ) -> Result<TaskOutcome> {
        let Some(agreement_no) = target.agreement_no else {
            return Ok(TaskOutcome::Failure {
                message: format!(
                    "agreement of partner {} carries no numeric key to update",
                    input.bp_code
                ),
            });
        };

        // Approved agreements cannot be edited directly.
        if target.status == ErpAgreementStatus::Approved {
            self.agreements
                .update_agreement_status(agreement_no, ErpAgreementStatus::OnHold)
                .await?;
            debug!(agreement_no, "approved agreement moved on hold for editing");
        }

        let mut updated = target.clone();
        match updated
            .lines
            .iter_mut()
            .find(|line| line.item_group_code == input.item_group_code)
        {
            // No duplicate line per item group across repeated runs.
            Some(line) => line.planned_quantity = Some(input.planned_quantity),
            None => updated.lines.push(ErpAgreementLine {
                item_group_code: input.item_group_code.clone(),
                planned_quantity: Some(input.planned_quantity),
                cumulative_quantity: None,
            }),
        }
        updated
            .planned_quantities
            .insert(input.item_group_code.clone(), input.planned_quantity);

        self.agreements.update_agreement(agreement_no, &updated).await?;

        Ok(TaskOutcome::Success {
            message: format!(
                "contract {} pushed into agreement {agreement_no}",
                input.contract.id
            ),
        })
    }

    async fn create_new(&self, input: &ContractPushInput) -> Result<TaskOutcome> {
        let agreement = ErpAgreement {
            agreement_no: None,
            doc_num: None,
            bp_code: input.bp_code.clone(),
            start_date: input.contract.start_date.clone(),
            end_date: input.contract.end_date.clone(),
            signing_date: input.contract.sign_date.clone(),
            status: ErpAgreementStatus::Draft,
            delivery_place_code: None,
            lines: vec![ErpAgreementLine {
                item_group_code: input.item_group_code.clone(),
                planned_quantity: Some(input.planned_quantity),
                cumulative_quantity: None,
            }],
            planned_quantities: std::iter::once((
                input.item_group_code.clone(),
                input.planned_quantity,
            ))
            .collect(),
        };

        let created = self.agreements.create_agreement(&agreement).await?;
        debug!(agreement_no = ?created.agreement_no, "agreement created for contract push");

        Ok(TaskOutcome::Success {
            message: format!(
                "contract {} pushed into new agreement {}",
                input.contract.id,
                created.agreement_no.unwrap_or_default()
            ),
        })
    }
}

#[async_trait]
impl JobProcessor for ContractPushTask {
    async fn process(&self, job: &SyncJob) -> Result<TaskOutcome> {
        let input: ContractPushInput = job.payload()?;

        let partner_agreements =
            self.agreements.list_agreements_for_partner(&input.bp_code).await?;

        match Self::select_target(&partner_agreements) {
            Some(target) => self.update_existing(target, &input).await,
            None => self.create_new(&input).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use coopsync_domain::ContractStatus;

    use super::*;
    use crate::reconcile::support::MemoryAgreementsApi;

    fn local_contract(id: &str) -> Contract {
        Contract {
            id: id.to_string(),
            sap_id: None,
            user_id: "u-1".into(),
            item_group_id: "group-103".into(),
            delivery_place_id: "place-1".into(),
            year: 2025,
            status: ContractStatus::Approved,
            contract_quantity: 500.0,
            delivered_quantity: 0.0,
            proposed_quantity: None,
            quantity_comment: None,
            reject_comment: None,
            area_details: None,
            start_date: Some("2025-01-01".into()),
            end_date: Some("2025-12-31".into()),
            sign_date: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn push_input(planned_quantity: f64) -> ContractPushInput {
        ContractPushInput {
            contract: local_contract("c-1"),
            bp_code: "C-100".into(),
            item_group_code: "103".into(),
            planned_quantity,
        }
    }

    fn job_with(input: &ContractPushInput) -> SyncJob {
        SyncJob::new(
            "contract-push",
            format!("contract-push-{}", input.contract.id),
            serde_json::to_string(input).expect("payload"),
            None,
            1_700_000_000,
        )
    }

    fn remote_agreement(
        agreement_no: i64,
        status: ErpAgreementStatus,
        lines: &[(&str, f64)],
    ) -> ErpAgreement {
        ErpAgreement {
            agreement_no: Some(agreement_no),
            doc_num: Some(agreement_no),
            bp_code: "C-100".into(),
            start_date: Some("2025-01-01".into()),
            end_date: Some("2025-12-31".into()),
            signing_date: None,
            status,
            delivery_place_code: None,
            lines: lines
                .iter()
                .map(|(code, qty)| ErpAgreementLine {
                    item_group_code: (*code).to_string(),
                    planned_quantity: Some(*qty),
                    cumulative_quantity: None,
                })
                .collect(),
            planned_quantities: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn creates_agreement_when_partner_has_none() {
        let api = Arc::new(MemoryAgreementsApi::default());
        let task = ContractPushTask::new(api.clone());

        let input = push_input(500.0);
        let outcome = task.process(&job_with(&input)).await.expect("runs");

        assert!(matches!(outcome, TaskOutcome::Success { .. }));
        let created = api.created.lock().expect("created").clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].status, ErpAgreementStatus::Draft);
        assert_eq!(created[0].lines.len(), 1);
        assert!(api.updated.lock().expect("updated").is_empty());
    }

    #[tokio::test]
    async fn updating_approved_agreement_goes_through_on_hold_first() {
        let api = Arc::new(MemoryAgreementsApi::with_agreements(vec![remote_agreement(
            12,
            ErpAgreementStatus::Approved,
            &[("104", 200.0)],
        )]));
        let task = ContractPushTask::new(api.clone());

        let input = push_input(500.0);
        task.process(&job_with(&input)).await.expect("runs");

        // Step one: the status transition.
        let status_updates = api.status_updates.lock().expect("status updates").clone();
        assert_eq!(status_updates, vec![(12, ErpAgreementStatus::OnHold)]);

        // Step two: the actual change, carrying the appended line.
        let updated = api.updated.lock().expect("updated").clone();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].0, 12);
        assert_eq!(updated[0].1.lines.len(), 2);
    }

    #[tokio::test]
    async fn on_hold_agreement_is_updated_without_status_transition() {
        let api = Arc::new(MemoryAgreementsApi::with_agreements(vec![remote_agreement(
            12,
            ErpAgreementStatus::OnHold,
            &[],
        )]));
        let task = ContractPushTask::new(api.clone());

        task.process(&job_with(&push_input(500.0))).await.expect("runs");

        assert!(api.status_updates.lock().expect("status updates").is_empty());
        assert_eq!(api.updated.lock().expect("updated").len(), 1);
    }

    #[tokio::test]
    async fn approved_agreement_is_preferred_over_on_hold_and_draft() {
        let api = Arc::new(MemoryAgreementsApi::with_agreements(vec![
            remote_agreement(10, ErpAgreementStatus::Draft, &[]),
            remote_agreement(11, ErpAgreementStatus::OnHold, &[]),
            remote_agreement(12, ErpAgreementStatus::Approved, &[]),
        ]));
        let task = ContractPushTask::new(api.clone());

        task.process(&job_with(&push_input(500.0))).await.expect("runs");

        let updated = api.updated.lock().expect("updated").clone();
        assert_eq!(updated[0].0, 12);
    }

    #[tokio::test]
    async fn repeated_push_updates_the_line_instead_of_appending() {
        let api = Arc::new(MemoryAgreementsApi::with_agreements(vec![remote_agreement(
            12,
            ErpAgreementStatus::OnHold,
            &[("103", 400.0)],
        )]));
        let task = ContractPushTask::new(api.clone());

        task.process(&job_with(&push_input(500.0))).await.expect("runs");

        let updated = api.updated.lock().expect("updated").clone();
        assert_eq!(updated[0].1.lines.len(), 1);
        assert_eq!(updated[0].1.lines[0].planned_quantity, Some(500.0));
    }
}
