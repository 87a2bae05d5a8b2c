//! Purchase delivery note and stock transfer clients.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coopsync_core::erp_ports::{PurchaseDeliveryNotesApi, StockTransfersApi};
use coopsync_domain::{
    CoopsyncError, ErpConfig, ErpPurchaseDeliveryNote, ErpStockTransfer, Result,
};
use reqwest::{Client, Method};

use super::request;
use super::session::ErpSessionManager;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Typed wrapper around the `PurchaseDeliveryNotes` collection.
pub struct PurchaseDeliveryNotesClient {
    http: Client,
    base_url: String,
    sessions: Arc<ErpSessionManager>,
}

impl PurchaseDeliveryNotesClient {
    /// Create a client for the configured ERP endpoint.
    pub fn new(config: &ErpConfig, sessions: Arc<ErpSessionManager>) -> Result<Self> {
        let http = request::build_http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sessions,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/PurchaseDeliveryNotes", self.base_url)
    }
}

#[async_trait]
impl PurchaseDeliveryNotesApi for PurchaseDeliveryNotesClient {
    async fn create_purchase_delivery_note(
        &self,
        note: &ErpPurchaseDeliveryNote,
    ) -> Result<ErpPurchaseDeliveryNote> {
        let session = self.sessions.get_session().await?;
        let body = serde_json::to_value(note).map_err(|e| {
            CoopsyncError::Internal(format!("failed to serialize delivery note: {e}"))
        })?;
        let result = request::fetch_json::<ErpPurchaseDeliveryNote>(
            &self.http,
            &session,
            Method::POST,
            &self.collection_url(),
            Some(&body),
        )
        .await;
        let ended = self.sessions.end_session(&session).await;

        let created = result?;
        ended?;
        created.ok_or_else(|| {
            CoopsyncError::Erp("delivery note create answered without a body".into())
        })
    }

    async fn list_purchase_delivery_notes(
        &self,
        card_code: &str,
    ) -> Result<Vec<ErpPurchaseDeliveryNote>> {
        let session = self.sessions.get_session().await?;
        let filter = format!("CardCode eq '{card_code}'");
        let result =
            request::fetch_all_pages(&self.http, &session, &self.collection_url(), Some(&filter))
                .await;
        let ended = self.sessions.end_session(&session).await;

        let notes = result?;
        ended?;
        Ok(notes)
    }
}

/// Typed wrapper around the `StockTransfers` collection.
pub struct StockTransfersClient {
    http: Client,
    base_url: String,
    sessions: Arc<ErpSessionManager>,
}

impl StockTransfersClient {
    /// Create a client for the configured ERP endpoint.
    pub fn new(config: &ErpConfig, sessions: Arc<ErpSessionManager>) -> Result<Self> {
        let http = request::build_http_client(Duration::from_secs(REQUEST_TIMEOUT_SECS))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sessions,
        })
    }
}

#[async_trait]
impl StockTransfersApi for StockTransfersClient {
    async fn create_stock_transfer(
        &self,
        transfer: &ErpStockTransfer,
    ) -> Result<ErpStockTransfer> {
        let session = self.sessions.get_session().await?;
        let url = format!("{}/StockTransfers", self.base_url);
        let body = serde_json::to_value(transfer).map_err(|e| {
            CoopsyncError::Internal(format!("failed to serialize stock transfer: {e}"))
        })?;
        let result = request::fetch_json::<ErpStockTransfer>(
            &self.http,
            &session,
            Method::POST,
            &url,
            Some(&body),
        )
        .await;
        let ended = self.sessions.end_session(&session).await;

        let created = result?;
        ended?;
        created.ok_or_else(|| {
            CoopsyncError::Erp("stock transfer create answered without a body".into())
        })
    }
}
