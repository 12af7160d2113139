//! OAuth2 client-credentials token management

use crate::config::VendorConfig;
use crate::{MspError, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Seconds shaved off every grant so a token is retired before the vendor does.
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Client-credentials identity for one vendor
#[derive(Clone)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub region: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("scope", &self.scope)
            .field("region", &self.region)
            .finish()
    }
}

/// Bearer token obtained from a client-credentials exchange. Never persisted.
#[derive(Clone)]
pub struct Token {
    pub access_token: String,
    /// Token type as reported by the vendor (usually "Bearer")
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    /// Already reduced by the safety margin
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Token {
    /// Fails when `expires_in` cannot be represented as an expiry instant
    pub fn from_grant(
        access_token: String,
        token_type: String,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Result<Self> {
        let lifetime = expires_in.saturating_sub(EXPIRY_SAFETY_MARGIN_SECS);
        let expires_at = Duration::try_seconds(lifetime)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                MspError::auth(format!(
                    "malformed token response: expires_in {expires_in} out of range"
                ))
            })?;

        Ok(Self {
            access_token,
            token_type,
            issued_at,
            expires_at,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Get the authorization header value
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    scope: Option<String>,
}

/// Snapshot of the cached token for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct TokenState {
    pub cached: bool,
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Owns one client-credentials identity and its cached token.
///
/// The cache slot is guarded by an async mutex held across the exchange, so
/// concurrent callers that find no valid token wait for a single refresh.
pub struct CredentialManager {
    credential: Credential,
    token_url: String,
    client: Client,
    token: Mutex<Option<Token>>,
}

impl CredentialManager {
    pub fn new(credential: Credential, token_url: impl Into<String>, client: Client) -> Self {
        Self {
            credential,
            token_url: token_url.into(),
            client,
            token: Mutex::new(None),
        }
    }

    /// Build from a validated vendor profile
    pub fn from_vendor(name: &str, vendor: &VendorConfig, client: Client) -> Result<Self> {
        let client_id = vendor
            .client_id
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MspError::Config(format!("{name}: client_id is missing")))?;
        let client_secret = vendor
            .client_secret
            .clone()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MspError::Config(format!("{name}: client_secret is missing")))?;

        let credential = Credential {
            client_id,
            client_secret,
            scope: vendor.scope.clone(),
            region: vendor.region.clone(),
        };

        Ok(Self::new(credential, vendor.resolved_token_url(), client))
    }

    /// Return the cached token while it is valid, otherwise exchange for a new one
    pub async fn ensure_valid(&self) -> Result<Token> {
        let mut slot = self.token.lock().await;

        if let Some(token) = slot.as_ref() {
            if token.is_valid() {
                return Ok(token.clone());
            }
            debug!(
                "Token for client {} expired at {}",
                self.credential.client_id, token.expires_at
            );
        }

        let token = self.exchange().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token if it is still the one the vendor rejected.
    /// A token refreshed by another caller in the meantime is kept.
    pub async fn invalidate(&self, rejected: &Token) {
        let mut slot = self.token.lock().await;
        if slot
            .as_ref()
            .is_some_and(|cached| cached.access_token == rejected.access_token)
        {
            debug!(
                "Dropping rejected token for client {}",
                self.credential.client_id
            );
            slot.take();
        }
    }

    pub async fn state(&self) -> TokenState {
        let slot = self.token.lock().await;
        match slot.as_ref() {
            Some(token) => TokenState {
                cached: true,
                valid: token.is_valid(),
                expires_at: Some(token.expires_at),
            },
            None => TokenState {
                cached: false,
                valid: false,
                expires_at: None,
            },
        }
    }

    async fn exchange(&self) -> Result<Token> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.credential.client_id.as_str()),
            ("client_secret", self.credential.client_secret.as_str()),
        ];
        if !self.credential.scope.is_empty() {
            form.push(("scope", self.credential.scope.as_str()));
        }

        debug!("Requesting access token from {}", self.token_url);
        let issued_at = Utc::now();

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| MspError::auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MspError::auth(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            warn!(
                "Token request for client {} rejected with {}",
                self.credential.client_id, status
            );
            return Err(MspError::Auth {
                message: format!("token endpoint returned {status}"),
                status: Some(status.as_u16()),
                body: Some(body),
            });
        }

        let grant: TokenResponse = serde_json::from_str(&body).map_err(|e| MspError::Auth {
            message: format!("malformed token response: {e}"),
            status: Some(status.as_u16()),
            body: None,
        })?;

        if grant.access_token.is_empty() {
            return Err(MspError::Auth {
                message: "token endpoint returned an empty access_token".to_string(),
                status: Some(status.as_u16()),
                body: None,
            });
        }

        let token = Token::from_grant(
            grant.access_token,
            grant.token_type.unwrap_or_else(|| "Bearer".to_string()),
            grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            issued_at,
        )?;

        info!(
            "Obtained access token for client {} (valid until {})",
            self.credential.client_id, token.expires_at
        );
        Ok(token)
    }
}
