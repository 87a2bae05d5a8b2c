//! Port interfaces for the remote ERP service layer
//!
//! One trait per ERP resource so reconciliation tasks can be tested against
//! fakes without standing up an HTTP server. Implementations bracket every
//! call with their own session acquire/release.

use async_trait::async_trait;
use coopsync_domain::{
    ErpAgreement, ErpAgreementStatus, ErpBusinessPartner, ErpDeliveryPlace, ErpItemGroup,
    ErpPurchaseDeliveryNote, ErpSession, ErpStockTransfer, Result,
};

/// Persistence for the single live ERP session slot.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self) -> Result<Option<ErpSession>>;
    async fn save(&self, session: &ErpSession) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Business partner (contact) collection.
#[async_trait]
pub trait BusinessPartnersApi: Send + Sync {
    async fn list_business_partners(&self) -> Result<Vec<ErpBusinessPartner>>;

    /// `None` when the ERP answers 404 for the card code.
    async fn find_business_partner(&self, card_code: &str) -> Result<Option<ErpBusinessPartner>>;
}

/// Blanket agreement collection.
#[async_trait]
pub trait AgreementsApi: Send + Sync {
    async fn list_agreements(&self) -> Result<Vec<ErpAgreement>>;

    async fn list_agreements_for_partner(&self, bp_code: &str) -> Result<Vec<ErpAgreement>>;

    /// Create a new agreement; returns the created record with its keys.
    async fn create_agreement(&self, agreement: &ErpAgreement) -> Result<ErpAgreement>;

    /// Partial update keyed by the agreement's numeric key.
    async fn update_agreement(&self, agreement_no: i64, agreement: &ErpAgreement) -> Result<()>;

    /// Status-only transition. Editing an approved agreement requires
    /// moving it on hold first; callers own that ordering.
    async fn update_agreement_status(
        &self,
        agreement_no: i64,
        status: ErpAgreementStatus,
    ) -> Result<()>;
}

/// Item group collection.
#[async_trait]
pub trait ItemGroupsApi: Send + Sync {
    async fn list_item_groups(&self) -> Result<Vec<ErpItemGroup>>;

    async fn find_item_group(&self, number: i64) -> Result<Option<ErpItemGroup>>;
}

/// Delivery place collection.
#[async_trait]
pub trait DeliveryPlacesApi: Send + Sync {
    async fn list_delivery_places(&self) -> Result<Vec<ErpDeliveryPlace>>;
}

/// Purchase delivery notes (goods receipts).
#[async_trait]
pub trait PurchaseDeliveryNotesApi: Send + Sync {
    async fn create_purchase_delivery_note(
        &self,
        note: &ErpPurchaseDeliveryNote,
    ) -> Result<ErpPurchaseDeliveryNote>;

    async fn list_purchase_delivery_notes(
        &self,
        card_code: &str,
    ) -> Result<Vec<ErpPurchaseDeliveryNote>>;
}

/// Warehouse stock transfers.
#[async_trait]
pub trait StockTransfersApi: Send + Sync {
    async fn create_stock_transfer(
        &self,
        transfer: &ErpStockTransfer,
    ) -> Result<ErpStockTransfer>;
}
