//! Reconciliation tasks translating ERP records into local upserts.
//!
//! Every task implements [`crate::queue::JobProcessor`] and follows one
//! error contract: resolvable business problems (missing user, missing
//! delivery place, prerequisite not synced yet) come back as task outcomes
//! so the batch continues, while unexpected errors propagate and are turned
//! into failure outcomes by the queue manager.

pub mod contacts;
pub mod contracts;
pub mod cumulative;
pub mod delivery_places;
pub mod item_groups;
pub mod operations;
pub mod push;

#[cfg(test)]
pub(crate) mod support;

pub use contacts::ContactSyncTask;
pub use contracts::{ContractSyncInput, ContractSyncTask};
pub use cumulative::CumulativeQuantitySyncTask;
pub use delivery_places::DeliveryPlaceSyncTask;
pub use item_groups::ItemGroupSyncTask;
pub use operations::{SyncOperations, SyncQueues};
pub use push::{ContractPushInput, ContractPushTask};
