//! Business partner client for the ERP service layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coopsync_core::erp_ports::BusinessPartnersApi;
use coopsync_domain::{ErpBusinessPartner, ErpConfig, Result};
use reqwest::{Client, Method};

use super::request;
use super::session::ErpSessionManager;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Typed wrapper around the `BusinessPartners` collection.
pub struct BusinessPartnersClient {
    http: Client,
    base_url: String,
    sessions: Arc<ErpSessionManager>,
}

impl BusinessPartnersClient {
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
        format!("{}/BusinessPartners", self.base_url)
    }
}

#[async_trait]
impl BusinessPartnersApi for BusinessPartnersClient {
    async fn list_business_partners(&self) -> Result<Vec<ErpBusinessPartner>> {
        let session = self.sessions.get_session().await?;
        let result =
            request::fetch_all_pages(&self.http, &session, &self.collection_url(), None).await;
        let ended = self.sessions.end_session(&session).await;

        let partners = result?;
        ended?;
        Ok(partners)
    }

    async fn find_business_partner(&self, card_code: &str) -> Result<Option<ErpBusinessPartner>> {
        let session = self.sessions.get_session().await?;
        let url = format!("{}('{card_code}')", self.collection_url());
        let result =
            request::fetch_json(&self.http, &session, Method::GET, &url, None).await;
        let ended = self.sessions.end_session(&session).await;

        let partner = result?;
        ended?;
        Ok(partner)
    }
}
