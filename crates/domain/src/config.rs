//! Configuration structures
//!
//! Deserialized from JSON or TOML by the infra loader, or assembled from
//! `COOPSYNC_*` environment variables. Validation of the ERP section is
//! fail-fast: clients refuse to construct without credentials.

use serde::{Deserialize, Serialize};

use crate::errors::{CoopsyncError, Result};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub erp: ErpConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
    /// Static item-group metadata keyed by ERP group code.
    #[serde(default)]
    pub item_group_catalog: Vec<ItemGroupSpec>,
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Remote ERP endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErpConfig {
    /// Base URL of the ERP service layer (e.g. "https://erp.example.com:50000/b1s/v1").
    pub base_url: String,
    pub company_db: String,
    pub username: String,
    pub password: String,
    /// Lifetime assigned to a fresh session.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
    /// Margin before expiry after which a session is replaced instead of reused.
    #[serde(default = "default_session_margin_secs")]
    pub session_margin_secs: i64,
}

impl ErpConfig {
    /// Reject configurations that could not possibly log in.
    ///
    /// # Errors
    /// Returns `CoopsyncError::Config` when the base URL or any credential
    /// field is empty, or when the expiry margin is not smaller than the TTL.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(CoopsyncError::Config("ERP base URL is required".into()));
        }
        if self.company_db.trim().is_empty()
            || self.username.trim().is_empty()
            || self.password.trim().is_empty()
        {
            return Err(CoopsyncError::Config(
                "ERP credentials (company db, username, password) are required".into(),
            ));
        }
        if self.session_margin_secs >= self.session_ttl_secs {
            return Err(CoopsyncError::Config(format!(
                "session margin ({}s) must be smaller than session TTL ({}s)",
                self.session_margin_secs, self.session_ttl_secs
            )));
        }
        Ok(())
    }
}

fn default_session_ttl_secs() -> i64 {
    crate::constants::SESSION_TTL_SECS
}

fn default_session_margin_secs() -> i64 {
    crate::constants::SESSION_EXPIRY_MARGIN_SECS
}

/// Cron trigger for the periodic full reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Six-field cron expression understood by the scheduler.
    pub cron_expression: String,
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 0 2 * * *".into(), // nightly at 02:00
            enabled: true,
        }
    }
}

/// Permission-cache rebuilder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionsConfig {
    /// Pause between the end of one full rebuild pass and the start of the
    /// next one.
    pub rebuild_delay_secs: u64,
    pub enabled: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self { rebuild_delay_secs: 60, enabled: true }
    }
}

/// Static item-group metadata the ERP export does not carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemGroupSpec {
    /// ERP group code this entry applies to.
    pub sap_id: String,
    pub display_name: String,
    pub category: ItemGroupCategory,
    pub minimum_profit_estimation: f64,
    /// ERP group code of an item group that must exist locally before this
    /// one can finish syncing.
    #[serde(default)]
    pub prerequisite_sap_id: Option<String>,
}

/// Product category of an item group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemGroupCategory {
    Frozen,
    Fresh,
}
