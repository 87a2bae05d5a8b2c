//! Item group client for the ERP service layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coopsync_core::erp_ports::ItemGroupsApi;
use coopsync_domain::{ErpConfig, ErpItemGroup, Result};
use reqwest::{Client, Method};

use super::request;
use super::session::ErpSessionManager;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Typed wrapper around the `ItemGroups` collection.
pub struct ItemGroupsClient {
    http: Client,
    base_url: String,
    sessions: Arc<ErpSessionManager>,
}

impl ItemGroupsClient {
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
        format!("{}/ItemGroups", self.base_url)
    }
}

#[async_trait]
impl ItemGroupsApi for ItemGroupsClient {
    async fn list_item_groups(&self) -> Result<Vec<ErpItemGroup>> {
        let session = self.sessions.get_session().await?;
        let result =
            request::fetch_all_pages(&self.http, &session, &self.collection_url(), None).await;
        let ended = self.sessions.end_session(&session).await;

        let groups = result?;
        ended?;
        Ok(groups)
    }

    async fn find_item_group(&self, number: i64) -> Result<Option<ErpItemGroup>> {
        let session = self.sessions.get_session().await?;
        let url = format!("{}({number})", self.collection_url());
        let result = request::fetch_json(&self.http, &session, Method::GET, &url, None).await;
        let ended = self.sessions.end_session(&session).await;

        let group = result?;
        ended?;
        Ok(group)
    }
}
