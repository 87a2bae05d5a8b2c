//! ERP session lifecycle.
//!
//! The ERP authenticates with a login call that answers two cookies: the
//! session identifier and the load-balancer route. A session lives in a
//! single persisted slot and is either valid (now is at least the safety
//! margin short of expiry) or replaced via logout and re-login. Resource
//! calls do not pool sessions: every logical operation brackets its one
//! request with `get_session()` and `end_session()`.

use std::sync::Arc;
use std::time::Duration;

use coopsync_core::erp_ports::SessionStore;
use coopsync_core::time::Clock;
use coopsync_domain::{CoopsyncError, ErpConfig, ErpSession, Result};
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::Client;
use tracing::{debug, info, warn};

use super::request;

const LOGIN_TIMEOUT_SECS: u64 = 30;

/// Cookie names set by the ERP login response.
const SESSION_COOKIE: &str = "B1SESSION";
const ROUTE_COOKIE: &str = "ROUTEID";

/// Manages the single persisted ERP session slot.
pub struct ErpSessionManager {
    http: Client,
    config: ErpConfig,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl ErpSessionManager {
    /// Create a session manager.
    ///
    /// # Errors
    /// Fails fast with `CoopsyncError::Config` when the ERP credentials are
    /// incomplete, before any queue work is attempted.
    pub fn new(
        config: ErpConfig,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let http = request::build_http_client(Duration::from_secs(LOGIN_TIMEOUT_SECS))?;

        Ok(Self { http, config, store, clock })
    }

    /// Return a valid session, reusing the persisted one when it is still
    /// comfortably inside its lifetime.
    ///
    /// A persisted session near or past expiry is logged out best-effort
    /// (a failed logout never blocks re-login) and replaced.
    pub async fn get_session(&self) -> Result<ErpSession> {
        if let Some(session) = self.store.find().await? {
            if session.is_valid_at(self.clock.now(), self.config.session_margin_secs) {
                debug!(expires_at = session.expires_at, "reusing persisted ERP session");
                return Ok(session);
            }

            debug!(expires_at = session.expires_at, "persisted ERP session is stale");
            if let Err(err) = self.logout(&session).await {
                warn!(error = %err, "logout of stale ERP session failed");
            }
            self.store.clear().await?;
        }

        self.login().await
    }

    /// Log the session out and clear the slot. The logout request is best
    /// effort; the slot is always cleared.
    pub async fn end_session(&self, session: &ErpSession) -> Result<()> {
        if let Err(err) = self.logout(session).await {
            warn!(error = %err, "ERP logout failed; discarding session anyway");
        }
        self.store.clear().await
    }

    /// The `Cookie` header value authenticating a request under `session`.
    pub fn session_cookie(session: &ErpSession) -> String {
        format!("{SESSION_COOKIE}={}; {ROUTE_COOKIE}={}", session.session_id, session.route_id)
    }

    async fn login(&self) -> Result<ErpSession> {
        let url = format!("{}/Login", self.base_url());
        let body = serde_json::json!({
            "CompanyDB": self.config.company_db,
            "UserName": self.config.username,
            "Password": self.config.password,
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request::transport_error("POST /Login", &e))?;
        let status = response.status();

        if !status.is_success() {
            let remote = response.text().await.unwrap_or_else(|_| "<unreadable body>".into());
            return Err(CoopsyncError::Auth(format!(
                "ERP login failed (HTTP {status}): {remote}"
            )));
        }

        let expires_at = self.clock.now() + self.config.session_ttl_secs;
        let session = parse_session_headers(response.headers(), expires_at)?;
        self.store.save(&session).await?;

        info!(expires_at = session.expires_at, "ERP session established");
        Ok(session)
    }

    async fn logout(&self, session: &ErpSession) -> Result<()> {
        let url = format!("{}/Logout", self.base_url());
        let response = self
            .http
            .post(&url)
            .header(COOKIE, Self::session_cookie(session))
            .send()
            .await
            .map_err(|e| request::transport_error("POST /Logout", &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoopsyncError::Network(format!(
                "ERP logout answered HTTP {status}"
            )));
        }

        debug!("ERP session logged out");
        Ok(())
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

/// Parse the session and route cookies out of the login response headers.
fn parse_session_headers(headers: &HeaderMap, expires_at: i64) -> Result<ErpSession> {
    let mut session_id = None;
    let mut route_id = None;

    for value in headers.get_all(SET_COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        let cookie = raw.split(';').next().unwrap_or(raw);
        if let Some((name, val)) = cookie.split_once('=') {
            match name.trim() {
                SESSION_COOKIE => session_id = Some(val.trim().to_string()),
                ROUTE_COOKIE => route_id = Some(val.trim().to_string()),
                _ => {}
            }
        }
    }

    let session_id = session_id.ok_or_else(|| {
        CoopsyncError::Session(format!("login response is missing the {SESSION_COOKIE} cookie"))
    })?;
    let route_id = route_id.ok_or_else(|| {
        CoopsyncError::Session(format!("login response is missing the {ROUTE_COOKIE} cookie"))
    })?;

    Ok(ErpSession { session_id, route_id, expires_at })
}
