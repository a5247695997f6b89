//! Error taxonomy shared by the deduplication engine, the Sheets client and
//! the HTTP layer.

use thiserror::Error;

/// Proxy result type
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Every failure the service can report to a caller.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed or missing request fields, detected before any I/O
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Sheet title or numeric id does not exist in the spreadsheet
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Failure reported by the spreadsheet backend, passed through verbatim
    #[error("Store error (status {status})")]
    Store {
        status: u16,
        details: serde_json::Value,
    },

    /// No usable credentials, or the token endpoint refused them
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Connection failure or timeout talking to an upstream API
    #[cfg(feature = "web")]
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid startup configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ProxyError::InvalidRequest(msg.into())
    }

    /// Machine-readable category, used as the `error` field of responses.
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::InvalidRequest(_) => "InvalidRequest",
            ProxyError::SheetNotFound(_) => "SheetNotFound",
            ProxyError::Store { .. } => "StoreError",
            ProxyError::Unauthorized(_) => "Unauthorized",
            #[cfg(feature = "web")]
            ProxyError::Transport(_) => "TransportError",
            ProxyError::Config(_) => "ConfigError",
        }
    }

    /// HTTP status the error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::InvalidRequest(_) => 400,
            ProxyError::SheetNotFound(_) => 404,
            ProxyError::Store { status, .. } if (400..600).contains(status) => *status,
            ProxyError::Store { .. } => 502,
            ProxyError::Unauthorized(_) => 401,
            #[cfg(feature = "web")]
            ProxyError::Transport(_) => 502,
            ProxyError::Config(_) => 500,
        }
    }
}
