//! Port interfaces for local business entities
//!
//! Repositories must provide atomic upsert-by-natural-key semantics so that
//! re-running a synchronization produces zero additional rows.

use async_trait::async_trait;
use coopsync_domain::{Contract, DeliveryPlace, ItemGroup, Result};

/// Local contract storage keyed by the composite sap id.
#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn find_by_sap_id(&self, sap_id: &str) -> Result<Option<Contract>>;

    async fn insert(&self, contract: &Contract) -> Result<()>;

    async fn update(&self, contract: &Contract) -> Result<()>;

    /// All contracts that carry an ERP correlation id.
    async fn list_with_sap_ids(&self) -> Result<Vec<Contract>>;
}

/// Local item group storage keyed by the ERP group code.
#[async_trait]
pub trait ItemGroupRepository: Send + Sync {
    async fn find_by_sap_id(&self, sap_id: &str) -> Result<Option<ItemGroup>>;

    /// Insert or update by `sap_id`, preserving the local id of an existing
    /// row.
    async fn upsert(&self, group: &ItemGroup) -> Result<()>;
}

/// Local delivery place storage keyed by the ERP code.
#[async_trait]
pub trait DeliveryPlaceRepository: Send + Sync {
    async fn find_by_sap_id(&self, sap_id: &str) -> Result<Option<DeliveryPlace>>;

    async fn insert(&self, place: &DeliveryPlace) -> Result<()>;

    async fn update(&self, place: &DeliveryPlace) -> Result<()>;
}
