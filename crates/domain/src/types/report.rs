//! Operation reports — the polling surface for batch synchronization runs.
//!
//! One report per logical batch ("one contract-sync run"); one item per
//! record in the batch. Items are created in pending shape at enqueue time
//! and completed exactly once by the queue manager when the job settles.
//! Counts are always computed from item flags so there is no second source
//! of truth to drift.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of synchronization batch a report tracks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    ContactSync,
    ItemGroupSync,
    DeliveryPlaceSync,
    ContractSync,
    ContractPush,
    CumulativeSync,
}

crate::impl_domain_status_conversions!(OperationType {
    ContactSync => "contact-sync",
    ItemGroupSync => "item-group-sync",
    DeliveryPlaceSync => "delivery-place-sync",
    ContractSync => "contract-sync",
    ContractPush => "contract-push",
    CumulativeSync => "cumulative-sync",
});

/// Aggregate for one batch of synchronization work.
///
/// Never mutated after creation except through its children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationReport {
    pub id: String,
    pub op_type: OperationType,
    pub created_at: i64,
}

impl OperationReport {
    pub fn new(op_type: OperationType, now: i64) -> Self {
        Self { id: Uuid::new_v4().to_string(), op_type, created_at: now }
    }
}

/// Outcome slot for a single record within a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationReportItem {
    pub id: String,
    pub report_id: String,
    pub message: Option<String>,
    pub completed: bool,
    pub success: bool,
    pub created_at: i64,
}

impl OperationReportItem {
    /// Pending shape: not completed, not successful, no message yet.
    pub fn pending(report_id: impl Into<String>, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            report_id: report_id.into(),
            message: None,
            completed: false,
            success: false,
            created_at: now,
        }
    }
}

/// Counts computed over a report's items, consumed by the REST layer for
/// progress polling.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct OperationReportSummary {
    pub id: String,
    pub op_type: String,
    pub started: i64,
    pub pending_count: u32,
    pub failed_count: u32,
    pub success_count: u32,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn operation_type_roundtrips() {
        for op in [
            OperationType::ContactSync,
            OperationType::ItemGroupSync,
            OperationType::DeliveryPlaceSync,
            OperationType::ContractSync,
            OperationType::ContractPush,
            OperationType::CumulativeSync,
        ] {
            assert_eq!(OperationType::from_str(&op.to_string()).unwrap(), op);
        }
    }

    #[test]
    fn pending_item_has_no_outcome() {
        let item = OperationReportItem::pending("report-1", 1_700_000_000);

        assert!(!item.completed);
        assert!(!item.success);
        assert!(item.message.is_none());
        assert_eq!(item.report_id, "report-1");
    }

    #[test]
    fn report_ids_are_unique() {
        let a = OperationReport::new(OperationType::ContactSync, 0);
        let b = OperationReport::new(OperationType::ContactSync, 0);
        assert_ne!(a.id, b.id);
    }
}
