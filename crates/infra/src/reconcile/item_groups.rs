//! Item-group synchronization.
//!
//! The ERP export carries only the group code and name; display name,
//! category, and minimum profit estimation come from the static catalog in
//! the configuration. A group whose catalog entry declares a prerequisite
//! group that has not been synced yet asks to be requeued instead of
//! failing, which gives the batch eventual convergence independent of the
//! ERP export order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::entity_ports::ItemGroupRepository;
use coopsync_core::time::Clock;
use coopsync_domain::{ErpItemGroup, ItemGroup, ItemGroupSpec, Result, SyncJob};
use tracing::debug;
use uuid::Uuid;

use crate::queue::{JobProcessor, TaskOutcome};

/// Task syncing one ERP item group into the local store.
pub struct ItemGroupSyncTask {
    groups: Arc<dyn ItemGroupRepository>,
    catalog: HashMap<String, ItemGroupSpec>,
    clock: Arc<dyn Clock>,
}

impl ItemGroupSyncTask {
    pub fn new(
        groups: Arc<dyn ItemGroupRepository>,
        catalog: Vec<ItemGroupSpec>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = catalog.into_iter().map(|spec| (spec.sap_id.clone(), spec)).collect();
        Self { groups, catalog, clock }
    }
}

#[async_trait]
impl JobProcessor for ItemGroupSyncTask {
    async fn process(&self, job: &SyncJob) -> Result<TaskOutcome> {
        let erp_group: ErpItemGroup = job.payload()?;
        let sap_id = erp_group.sap_id();

        let Some(spec) = self.catalog.get(&sap_id) else {
            return Ok(TaskOutcome::Failure {
                message: format!("item group {sap_id} ({}) has no catalog entry", erp_group.group_name),
            });
        };

        let prerequisite_item_group_id = match &spec.prerequisite_sap_id {
            Some(prereq_sap_id) => {
                match self.groups.find_by_sap_id(prereq_sap_id).await? {
                    Some(prereq) => Some(prereq.id),
                    None => {
                        return Ok(TaskOutcome::Requeue {
                            message: format!(
                                "item group {sap_id} waits for prerequisite {prereq_sap_id}"
                            ),
                        });
                    }
                }
            }
            None => None,
        };

        let now = self.clock.now();
        let existing = self.groups.find_by_sap_id(&sap_id).await?;
        let group = ItemGroup {
            id: existing
                .as_ref()
                .map(|g| g.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            sap_id: sap_id.clone(),
            name: erp_group.group_name.clone(),
            display_name: Some(spec.display_name.clone()),
            category: Some(spec.category),
            minimum_profit_estimation: spec.minimum_profit_estimation,
            prerequisite_item_group_id,
            created_at: existing.as_ref().map(|g| g.created_at).unwrap_or(now),
            updated_at: now,
        };

        self.groups.upsert(&group).await?;

        debug!(sap_id = %sap_id, "item group synchronized");
        Ok(TaskOutcome::Success {
            message: format!("item group {sap_id} ({}) synchronized", erp_group.group_name),
        })
    }
}
