//! Delivery-place synchronization: upsert by ERP code, rename on change.

use std::sync::Arc;

use async_trait::async_trait;
use coopsync_core::entity_ports::DeliveryPlaceRepository;
use coopsync_core::time::Clock;
use coopsync_domain::{DeliveryPlace, ErpDeliveryPlace, Result, SyncJob};
use tracing::debug;

use crate::queue::{JobProcessor, TaskOutcome};

/// Task syncing one ERP delivery place into the local store.
pub struct DeliveryPlaceSyncTask {
    places: Arc<dyn DeliveryPlaceRepository>,
    clock: Arc<dyn Clock>,
}

impl DeliveryPlaceSyncTask {
    pub fn new(places: Arc<dyn DeliveryPlaceRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { places, clock }
    }
}

#[async_trait]
impl JobProcessor for DeliveryPlaceSyncTask {
    async fn process(&self, job: &SyncJob) -> Result<TaskOutcome> {
        let erp_place: ErpDeliveryPlace = job.payload()?;
        let now = self.clock.now();

        match self.places.find_by_sap_id(&erp_place.code).await? {
            None => {
                let place = DeliveryPlace::new(&erp_place.code, &erp_place.name, now);
                self.places.insert(&place).await?;
                debug!(code = %erp_place.code, "delivery place created");
            }
            Some(mut existing) => {
                if existing.name != erp_place.name {
                    existing.name = erp_place.name.clone();
                    existing.updated_at = now;
                    self.places.update(&existing).await?;
                    debug!(code = %erp_place.code, "delivery place renamed");
                }
            }
        }

        Ok(TaskOutcome::Success {
            message: format!("delivery place {} ({}) synchronized", erp_place.code, erp_place.name),
        })
    }
}
