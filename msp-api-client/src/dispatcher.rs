//! Authenticated REST calls against a vendor's versioned base URL

use msp_mcp_shared::{CredentialManager, MspError, Result, VendorConfig};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Methods whose body is serialized as JSON
    pub fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl FromStr for HttpMethod {
    type Err = MspError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(MspError::Validation(format!(
                "unsupported HTTP method '{other}'"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// Body of a successful call. Callers must not assume a fixed shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
}

impl ApiResponse {
    pub fn into_value(self) -> Value {
        match self {
            ApiResponse::Json(value) => value,
            ApiResponse::Text(text) => Value::String(text),
        }
    }
}

pub struct RequestDispatcher {
    credentials: Arc<CredentialManager>,
    client: Client,
    base_url: String,
}

impl RequestDispatcher {
    pub fn new(
        credentials: Arc<CredentialManager>,
        client: Client,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Region base URL plus the vendor's versioned API prefix
    pub fn from_vendor(
        vendor: &VendorConfig,
        credentials: Arc<CredentialManager>,
        client: Client,
    ) -> Self {
        let prefix = vendor.api_base_path.trim_matches('/');
        let base_url = if prefix.is_empty() {
            vendor.base_url()
        } else {
            format!("{}/{}", vendor.base_url(), prefix)
        };
        Self::new(credentials, client, base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Resolve a relative API path. Absolute URLs are refused so the bearer
    /// token is only ever sent to the configured host.
    pub fn url_for(&self, path: &str) -> Result<String> {
        let path = path.trim();
        if path.contains("://") {
            return Err(MspError::Validation(format!(
                "path must be relative to the API base URL, got '{path}'"
            )));
        }
        Ok(format!("{}/{}", self.base_url, path.trim_start_matches('/')))
    }

    /// Issue one authenticated call
    pub async fn request(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<&Value>,
        query: Option<&Map<String, Value>>,
    ) -> Result<ApiResponse> {
        let url = self.url_for(path)?;
        let token = self.credentials.ensure_valid().await?;

        let mut builder = self
            .client
            .request(method.as_reqwest(), &url)
            .header(AUTHORIZATION, token.authorization_header())
            .header(ACCEPT, "application/json");

        if let Some(query) = query {
            let pairs = query_pairs(query);
            if !pairs.is_empty() {
                builder = builder.query(&pairs);
            }
        }

        match body {
            Some(body) if method.carries_body() => builder = builder.json(body),
            Some(_) => debug!("Ignoring request body for {} {}", method, path),
            None => {}
        }

        debug!("{} {}", method, url);
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                // The vendor revoked the token early; the next call re-authenticates.
                self.credentials.invalidate(&token).await;
            }
            let body = response.text().await.unwrap_or_default();
            warn!("{} {} failed with {}", method, path, status);
            return Err(MspError::Api {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        let text = response.text().await?;
        if is_json && !text.trim().is_empty() {
            match serde_json::from_str(&text) {
                Ok(value) => return Ok(ApiResponse::Json(value)),
                Err(e) => warn!("{} {} declared JSON but did not parse: {}", method, path, e),
            }
        }
        Ok(ApiResponse::Text(text))
    }

    /// Authenticated GET returning the raw body
    pub async fn fetch_text(&self, path: &str) -> Result<String> {
        match self.request(path, HttpMethod::Get, None, None).await? {
            ApiResponse::Text(text) => Ok(text),
            ApiResponse::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

/// Flatten query arguments, skipping nulls and repeating keys for arrays
fn query_pairs(query: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in query {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push((key.clone(), scalar_to_string(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_to_string(other))),
        }
    }
    pairs
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
