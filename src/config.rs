//! Service configuration
//!
//! Everything is read from the environment (a `.env` file is loaded first
//! when present). Client credentials are never compiled in.

use crate::error::{ProxyError, Result};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Proxy server configuration
#[derive(Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// OAuth2 client id, used for refresh and code exchange
    pub client_id: Option<String>,
    /// OAuth2 client secret
    pub client_secret: Option<String>,
    /// Server-wide refresh token used when a request brings no credentials
    pub refresh_token: Option<String>,
    /// Sheets v4 base URL, without trailing slash
    pub sheets_api_base: String,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// Timeout applied to every outbound request
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            sheets_api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    #[cfg(feature = "web")]
    pub fn from_env() -> Result<Self> {
        // A missing .env is normal in deployments
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match get("PORT") {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ProxyError::Config(format!("PORT must be a port number, got '{}'", p)))?,
            None => defaults.bind_addr.port(),
        };
        let bind_addr = format!("{}:{}", host, port)
            .parse::<SocketAddr>()
            .map_err(|e| ProxyError::Config(format!("invalid HOST '{}': {}", host, e)))?;

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(t) => Duration::from_secs(t.parse::<u64>().map_err(|_| {
                ProxyError::Config(format!("REQUEST_TIMEOUT_SECS must be a whole number, got '{}'", t))
            })?),
            None => defaults.request_timeout,
        };

        Ok(Config {
            bind_addr,
            client_id: get("GOOGLE_CLIENT_ID"),
            client_secret: get("GOOGLE_CLIENT_SECRET"),
            refresh_token: get("GOOGLE_REFRESH_TOKEN"),
            sheets_api_base: get("SHEETS_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.sheets_api_base),
            token_url: get("OAUTH_TOKEN_URL").unwrap_or(defaults.token_url),
            request_timeout,
        })
    }

    /// Set bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Point the client at a different Sheets API root
    pub fn sheets_api_base(mut self, base: impl Into<String>) -> Self {
        self.sheets_api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Point token refresh and exchange at a different endpoint
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set OAuth2 client credentials
    pub fn client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the server-wide refresh token
    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("sheets_api_base", &self.sheets_api_base)
            .field("token_url", &self.token_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
