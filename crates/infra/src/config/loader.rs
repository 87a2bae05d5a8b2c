//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `COOPSYNC_DB_PATH`: Database file path
//! - `COOPSYNC_DB_POOL_SIZE`: Connection pool size
//! - `COOPSYNC_ERP_BASE_URL`: ERP service-layer base URL
//! - `COOPSYNC_ERP_COMPANY_DB`: ERP company database
//! - `COOPSYNC_ERP_USERNAME` / `COOPSYNC_ERP_PASSWORD`: ERP credentials
//! - `COOPSYNC_SCHEDULER_CRON`: cron expression for the reconciliation run
//! - `COOPSYNC_SCHEDULER_ENABLED`: whether the cron trigger runs (true/false)
//! - `COOPSYNC_PERMISSIONS_DELAY`: pause between permission rebuild passes
//! - `COOPSYNC_PERMISSIONS_ENABLED`: whether the rebuilder runs (true/false)
//!
//! The item-group catalog cannot be expressed in environment variables; it
//! is empty when loading from the environment and populated from the file
//! form.

use std::path::{Path, PathBuf};

use coopsync_domain::{
    Config, CoopsyncError, DatabaseConfig, ErpConfig, PermissionsConfig, Result, SchedulerConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `CoopsyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing or the ERP section fails validation
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CoopsyncError::Config` if required variables are missing, have
/// invalid values, or the ERP section fails validation.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("COOPSYNC_DB_PATH")?;
    let db_pool_size = env_var("COOPSYNC_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| CoopsyncError::Config(format!("Invalid pool size: {}", e)))
    })?;

    let erp = ErpConfig {
        base_url: env_var("COOPSYNC_ERP_BASE_URL")?,
        company_db: env_var("COOPSYNC_ERP_COMPANY_DB")?,
        username: env_var("COOPSYNC_ERP_USERNAME")?,
        password: env_var("COOPSYNC_ERP_PASSWORD")?,
        session_ttl_secs: env_i64("COOPSYNC_ERP_SESSION_TTL", coopsync_domain::constants::SESSION_TTL_SECS)?,
        session_margin_secs: env_i64(
            "COOPSYNC_ERP_SESSION_MARGIN",
            coopsync_domain::constants::SESSION_EXPIRY_MARGIN_SECS,
        )?,
    };
    erp.validate()?;

    let scheduler_defaults = SchedulerConfig::default();
    let scheduler = SchedulerConfig {
        cron_expression: std::env::var("COOPSYNC_SCHEDULER_CRON")
            .unwrap_or(scheduler_defaults.cron_expression),
        enabled: env_bool("COOPSYNC_SCHEDULER_ENABLED", scheduler_defaults.enabled),
    };

    let permissions_defaults = PermissionsConfig::default();
    let permissions = PermissionsConfig {
        rebuild_delay_secs: env_i64(
            "COOPSYNC_PERMISSIONS_DELAY",
            permissions_defaults.rebuild_delay_secs as i64,
        )?
        .max(0) as u64,
        enabled: env_bool("COOPSYNC_PERMISSIONS_ENABLED", permissions_defaults.enabled),
    };

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size: db_pool_size },
        erp,
        scheduler,
        permissions,
        item_group_catalog: Vec::new(),
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `CoopsyncError::Config` if the file cannot be found or parsed,
/// or the ERP section fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CoopsyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CoopsyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CoopsyncError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.erp.validate()?;
    Ok(config)
}

/// Parse configuration from string content, detecting the format from the
/// file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CoopsyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CoopsyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CoopsyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe standard locations for a configuration file, nearest first.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("coopsync.json"),
            cwd.join("coopsync.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("coopsync.json"),
                exe_dir.join("coopsync.toml"),
            ]);
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CoopsyncError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an integer environment variable with a default.
fn env_i64(key: &str, default: i64) -> Result<i64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<i64>()
            .map_err(|e| CoopsyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
