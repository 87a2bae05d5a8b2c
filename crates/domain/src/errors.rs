//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Coopsync
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CoopsyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// ERP login response could not be turned into a usable session
    /// (missing session or route cookie).
    #[error("Session error: {0}")]
    Session(String),

    /// Non-2xx ERP response; the message carries the remote error payload
    /// and the outgoing request body for diagnostics.
    #[error("ERP error: {0}")]
    Erp(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Coopsync operations
pub type Result<T> = std::result::Result<T, CoopsyncError>;
