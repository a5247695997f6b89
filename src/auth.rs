//! OAuth2 access-token handling.
//!
//! Requests authenticate in one of four ways, checked in this order:
//! an `Authorization: Bearer` header carrying a ready access token, an
//! `X-Goog-Service-Account-Info` header carrying a service-account key file,
//! an `X-Goog-Refresh-Token` header, or the server's own refresh token from
//! configuration. Service accounts sign an RS256 JWT-bearer assertion and
//! refresh tokens are sent as-is; either way the token endpoint answers with
//! an access token that is cached until shortly before it expires.

use crate::config::Config;
use crate::error::{ProxyError, Result};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const REFRESH_TOKEN_HEADER: &str = "x-goog-refresh-token";
pub const SERVICE_ACCOUNT_HEADER: &str = "x-goog-service-account-info";

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

// Tokens are refreshed this long before Google says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// How one request authenticates against the Sheets API.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    ServiceAccount(ServiceAccountKey),
    RefreshToken(String),
}

impl Credentials {
    pub fn from_headers(headers: &HeaderMap, server_refresh_token: Option<&str>) -> Result<Self> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let value = value
                .to_str()
                .map_err(|_| ProxyError::Unauthorized("Authorization header is not valid text.".into()))?;
            return match value.strip_prefix("Bearer ").map(str::trim) {
                Some(token) if !token.is_empty() => Ok(Credentials::AccessToken(token.to_string())),
                _ => Err(ProxyError::Unauthorized(
                    "Authorization header must be 'Bearer <access token>'.".into(),
                )),
            };
        }

        if let Some(value) = headers.get(SERVICE_ACCOUNT_HEADER) {
            let raw = value.to_str().map(str::trim).unwrap_or_default();
            if raw.is_empty() {
                return Err(ProxyError::invalid(format!(
                    "Header '{}' is empty or not valid text.",
                    SERVICE_ACCOUNT_HEADER
                )));
            }
            return ServiceAccountKey::from_json(raw).map(Credentials::ServiceAccount);
        }

        if let Some(value) = headers.get(REFRESH_TOKEN_HEADER) {
            let token = value.to_str().map(str::trim).unwrap_or_default();
            if token.is_empty() {
                return Err(ProxyError::Unauthorized(format!(
                    "Header '{}' is empty or not valid text.",
                    REFRESH_TOKEN_HEADER
                )));
            }
            return Ok(Credentials::RefreshToken(token.to_string()));
        }

        match server_refresh_token {
            Some(token) => Ok(Credentials::RefreshToken(token.to_string())),
            None => Err(ProxyError::Unauthorized(
                "No credentials: send 'Authorization: Bearer <token>', an 'X-Goog-Service-Account-Info' \
                 or an 'X-Goog-Refresh-Token' header."
                    .into(),
            )),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Credentials::ServiceAccount(key) => write!(f, "ServiceAccount({:?})", key),
            Credentials::RefreshToken(_) => f.write_str("RefreshToken(<redacted>)"),
        }
    }
}

/// Service-account key file, as downloaded from the cloud console.
///
/// Only the fields needed to sign an assertion are kept; the rest of the
/// file (`project_id`, `token_uri`, ...) is ignored.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|_| {
            ProxyError::invalid(format!(
                "The value of the '{}' header is not valid JSON.",
                SERVICE_ACCOUNT_HEADER
            ))
        })?;
        if value.get("private_key").is_none() {
            return Err(ProxyError::invalid(
                "The service account info is missing the 'private_key'.",
            ));
        }
        serde_json::from_value(value).map_err(|e| {
            ProxyError::invalid(format!("The provided service account JSON is invalid: {}", e))
        })
    }

    /// RS256-signed JWT-bearer assertion addressed to `audience`.
    pub fn assertion(&self, audience: &str, issued_at: u64) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            ProxyError::invalid(format!("The service account private key is not a valid RSA key: {}", e))
        })?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: audience,
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&header, &claims, &key).map_err(|e| {
            ProxyError::invalid(format!("Could not sign the service account assertion: {}", e))
        })
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Token endpoint response, for both grant types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct OAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    cache: Mutex<HashMap<String, CachedToken>>,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        OAuthClient {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Access token for `credentials`, refreshing when needed.
    pub async fn access_token(&self, credentials: &Credentials) -> Result<String> {
        match credentials {
            Credentials::AccessToken(token) => Ok(token.clone()),
            Credentials::ServiceAccount(key) => self.service_account_token(key).await,
            Credentials::RefreshToken(refresh_token) => self.refresh(refresh_token).await,
        }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        if let Some(token) = self.cached(refresh_token) {
            debug!("Using cached access token");
            return Ok(token);
        }

        let (client_id, client_secret) = self.client_credentials()?;
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
            ])
            .await?;

        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS));
        info!("Access token refreshed, valid for {}s", lifetime.as_secs());
        self.remember(refresh_token.to_string(), &response.access_token, lifetime);
        Ok(response.access_token)
    }

    /// Access token for a service account, cached per `client_email`.
    pub async fn service_account_token(&self, key: &ServiceAccountKey) -> Result<String> {
        let cache_key = format!("service-account:{}", key.client_email);
        if let Some(token) = self.cached(&cache_key) {
            debug!("Using cached access token for {}", key.client_email);
            return Ok(token);
        }

        let assertion = key.assertion(&self.token_url, jsonwebtoken::get_current_timestamp())?;
        let response = self
            .request_token(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .await?;

        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS));
        info!(
            "Access token issued for service account {}, valid for {}s",
            key.client_email,
            lifetime.as_secs()
        );
        self.remember(cache_key, &response.access_token, lifetime);
        Ok(response.access_token)
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let (client_id, client_secret) = self.client_credentials()?;
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
            ])
            .await?;
        info!(
            "Authorization code exchanged (refresh token issued: {})",
            response.refresh_token.is_some()
        );
        Ok(response)
    }

    fn cached(&self, cache_key: &str) -> Option<String> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(cache_key)
            .filter(|t| t.expires_at > Instant::now() + EXPIRY_MARGIN)
            .map(|t| t.access_token.clone())
    }

    // Expired entries are dropped on every insert.
    fn remember(&self, cache_key: String, access_token: &str, lifetime: Duration) {
        if let Ok(mut cache) = self.cache.lock() {
            let now = Instant::now();
            cache.retain(|_, t| t.expires_at > now);
            cache.insert(
                cache_key,
                CachedToken {
                    access_token: access_token.to_string(),
                    expires_at: now + lifetime,
                },
            );
        }
    }

    fn client_credentials(&self) -> Result<(&str, &str)> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ProxyError::Unauthorized(
                "GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be configured to use refresh tokens.".into(),
            )),
        }
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.http.post(&self.token_url).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token endpoint returned {}: {}", status, body);
            return Err(ProxyError::Unauthorized(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }
        Ok(response.json::<TokenResponse>().await?)
    }
}
