//! Remote ERP service-layer integration.
//!
//! The session manager owns login/logout and the persisted session slot;
//! each resource client brackets its single request with a session
//! acquire/release so no session state is shared across concurrent calls.

pub mod agreements;
pub mod business_partners;
pub mod delivery_places;
pub mod documents;
pub mod item_groups;
pub mod request;
pub mod session;

pub use agreements::AgreementsClient;
pub use business_partners::BusinessPartnersClient;
pub use delivery_places::DeliveryPlacesClient;
pub use documents::{PurchaseDeliveryNotesClient, StockTransfersClient};
pub use item_groups::ItemGroupsClient;
pub use session::ErpSessionManager;
