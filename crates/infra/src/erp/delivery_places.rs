//! Delivery place client for the ERP service layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coopsync_core::erp_ports::DeliveryPlacesApi;
use coopsync_domain::{ErpConfig, ErpDeliveryPlace, Result};
use reqwest::Client;

use super::request;
use super::session::ErpSessionManager;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Typed wrapper around the `DeliveryPlaces` collection.
pub struct DeliveryPlacesClient {
    http: Client,
    base_url: String,
    sessions: Arc<ErpSessionManager>,
}

impl DeliveryPlacesClient {
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
impl DeliveryPlacesApi for DeliveryPlacesClient {
    async fn list_delivery_places(&self) -> Result<Vec<ErpDeliveryPlace>> {
        let session = self.sessions.get_session().await?;
        let url = format!("{}/DeliveryPlaces", self.base_url);
        let result = request::fetch_all_pages(&self.http, &session, &url, None).await;
        let ended = self.sessions.end_session(&session).await;

        let places = result?;
        ended?;
        Ok(places)
    }
}
