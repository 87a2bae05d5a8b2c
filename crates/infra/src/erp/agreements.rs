//! Blanket agreement client for the ERP service layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coopsync_core::erp_ports::AgreementsApi;
use coopsync_domain::{
    CoopsyncError, ErpAgreement, ErpAgreementStatus, ErpConfig, Result,
};
use reqwest::{Client, Method};

use super::request;
use super::session::ErpSessionManager;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Typed wrapper around the `BlanketAgreements` collection.
pub struct AgreementsClient {
    http: Client,
    base_url: String,
    sessions: Arc<ErpSessionManager>,
}

impl AgreementsClient {
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
        format!("{}/BlanketAgreements", self.base_url)
    }

    fn record_url(&self, agreement_no: i64) -> String {
        format!("{}({agreement_no})", self.collection_url())
    }
}

#[async_trait]
impl AgreementsApi for AgreementsClient {
    async fn list_agreements(&self) -> Result<Vec<ErpAgreement>> {
        let session = self.sessions.get_session().await?;
        let result =
            request::fetch_all_pages(&self.http, &session, &self.collection_url(), None).await;
        let ended = self.sessions.end_session(&session).await;

        let agreements = result?;
        ended?;
        Ok(agreements)
    }

    async fn list_agreements_for_partner(&self, bp_code: &str) -> Result<Vec<ErpAgreement>> {
        let session = self.sessions.get_session().await?;
        let filter = format!("BPCode eq '{bp_code}'");
        let result =
            request::fetch_all_pages(&self.http, &session, &self.collection_url(), Some(&filter))
                .await;
        let ended = self.sessions.end_session(&session).await;

        let agreements = result?;
        ended?;
        Ok(agreements)
    }

    async fn create_agreement(&self, agreement: &ErpAgreement) -> Result<ErpAgreement> {
        let session = self.sessions.get_session().await?;
        let body = serde_json::to_value(agreement)
            .map_err(|e| CoopsyncError::Internal(format!("failed to serialize agreement: {e}")))?;
        let result = request::fetch_json::<ErpAgreement>(
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
            CoopsyncError::Erp("agreement create answered without a body".into())
        })
    }

    async fn update_agreement(&self, agreement_no: i64, agreement: &ErpAgreement) -> Result<()> {
        let session = self.sessions.get_session().await?;
        let body = serde_json::to_value(agreement)
            .map_err(|e| CoopsyncError::Internal(format!("failed to serialize agreement: {e}")))?;
        let result = request::fetch_json::<serde_json::Value>(
            &self.http,
            &session,
            Method::PATCH,
            &self.record_url(agreement_no),
            Some(&body),
        )
        .await;
        let ended = self.sessions.end_session(&session).await;

        result?;
        ended?;
        Ok(())
    }

    async fn update_agreement_status(
        &self,
        agreement_no: i64,
        status: ErpAgreementStatus,
    ) -> Result<()> {
        let session = self.sessions.get_session().await?;
        let body = serde_json::json!({ "Status": status.as_erp_str() });
        let result = request::fetch_json::<serde_json::Value>(
            &self.http,
            &session,
            Method::PATCH,
            &self.record_url(agreement_no),
            Some(&body),
        )
        .await;
        let ended = self.sessions.end_session(&session).await;

        result?;
        ended?;
        Ok(())
    }
}
