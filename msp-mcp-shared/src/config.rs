//! Configuration management for the MSP MCP server

use crate::types::{CategoryRule, RegionTable, SchemaSource, VendorKind};
use crate::{MspError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Main configuration for the MSP MCP server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MspConfig {
    /// Vendor profiles keyed by tool prefix
    pub vendors: BTreeMap<String, VendorConfig>,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Introspection query cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One REST service reachable through OAuth2 client credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    pub display_name: String,

    pub kind: VendorKind,

    /// Overridden by `<VENDOR>_CLIENT_ID`
    #[serde(default)]
    pub client_id: Option<String>,

    /// Overridden by `<VENDOR>_CLIENT_SECRET`
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub scope: String,

    /// Selected region or tenant code, overridden by `<VENDOR>_REGION`
    #[serde(default)]
    pub region: Option<String>,

    pub default_region: String,

    /// Region or tenant code to base URL
    pub regions: BTreeMap<String, String>,

    /// Versioned prefix appended to the base URL for resource calls
    #[serde(default)]
    pub api_base_path: String,

    /// Absolute URL, or a path resolved against the region base URL
    pub token_url: String,

    #[serde(default)]
    pub schema: Option<SchemaSource>,

    /// Ordered categorization rules; empty means the built-in table
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
}

impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("display_name", &self.display_name)
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("scope", &self.scope)
            .field("region", &self.region)
            .field("default_region", &self.default_region)
            .field("regions", &self.regions)
            .field("api_base_path", &self.api_base_path)
            .field("token_url", &self.token_url)
            .field("schema", &self.schema)
            .field("categories", &self.categories.len())
            .finish()
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable memoization of introspection queries
    pub enabled: bool,

    /// Maximum cached query results per vendor
    pub max_entries: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl VendorConfig {
    pub fn region_table(&self) -> RegionTable {
        RegionTable::new(self.regions.clone(), self.default_region.clone())
    }

    /// Base URL for the configured region, falling back to the default region
    pub fn base_url(&self) -> String {
        self.region_table()
            .resolve(self.region.as_deref())
            .trim_end_matches('/')
            .to_string()
    }

    /// Token endpoint with relative paths resolved against the base URL
    pub fn resolved_token_url(&self) -> String {
        if self.token_url.starts_with("http://") || self.token_url.starts_with("https://") {
            self.token_url.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url(),
                self.token_url.trim_start_matches('/')
            )
        }
    }

    fn validate(&self, name: &str, problems: &mut Vec<String>) {
        if self.client_id.as_deref().map_or(true, str::is_empty) {
            problems.push(format!(
                "{name}: client_id is missing (set {}_CLIENT_ID)",
                env_prefix(name)
            ));
        }
        if self.client_secret.as_deref().map_or(true, str::is_empty) {
            problems.push(format!(
                "{name}: client_secret is missing (set {}_CLIENT_SECRET)",
                env_prefix(name)
            ));
        }
        if !self.region_table().contains(&self.default_region) {
            problems.push(format!(
                "{name}: default_region '{}' is not in the region table",
                self.default_region
            ));
        }
        for (region, base) in &self.regions {
            if let Err(e) = check_http_url(base) {
                problems.push(format!("{name}: region '{region}' base URL: {e}"));
            }
        }
        if self.token_url.is_empty() {
            problems.push(format!("{name}: token_url is empty"));
        } else if self.token_url.contains("://") {
            if let Err(e) = check_http_url(&self.token_url) {
                problems.push(format!("{name}: token_url: {e}"));
            }
        }
    }
}

fn check_http_url(raw: &str) -> Result<()> {
    let url = url::Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(MspError::Config(format!("unsupported scheme '{other}'"))),
    }
}

/// `my-psa` -> `MY_PSA`
pub fn env_prefix(vendor: &str) -> String {
    vendor
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl MspConfig {
    /// Load configuration from file or create default
    pub fn load_or_default(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let config: MspConfig = serde_json::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Apply `<VENDOR>_CLIENT_ID`, `<VENDOR>_CLIENT_SECRET` and `<VENDOR>_REGION`
    /// from the process environment (after loading `.env`).
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| dotenvy::var(key).ok());
    }

    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, vendor) in self.vendors.iter_mut() {
            let prefix = env_prefix(name);
            if let Some(id) = lookup(&format!("{prefix}_CLIENT_ID")) {
                vendor.client_id = Some(id);
            }
            if let Some(secret) = lookup(&format!("{prefix}_CLIENT_SECRET")) {
                vendor.client_secret = Some(secret);
            }
            if let Some(region) = lookup(&format!("{prefix}_REGION")) {
                vendor.region = Some(region);
            }
        }
    }

    /// Every problem is reported at once so startup fails with the full list.
    pub fn validate(&self) -> Result<()> {
        if self.vendors.is_empty() {
            return Err(MspError::Config("no vendors configured".to_string()));
        }

        let mut problems = Vec::new();
        for (name, vendor) in &self.vendors {
            vendor.validate(name, &mut problems);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(MspError::Config(problems.join("; ")))
        }
    }

    /// Starter configuration written by `--init`
    pub fn example() -> Self {
        let mut vendors = BTreeMap::new();

        vendors.insert(
            "rmm".to_string(),
            VendorConfig {
                display_name: "Device Management".to_string(),
                kind: VendorKind::DeviceManagement,
                client_id: None,
                client_secret: None,
                scope: "monitoring management".to_string(),
                region: Some("us".to_string()),
                default_region: "us".to_string(),
                regions: [
                    ("us", "https://us.rmm.example.com"),
                    ("eu", "https://eu.rmm.example.com"),
                    ("ca", "https://ca.rmm.example.com"),
                    ("oc", "https://oc.rmm.example.com"),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
                api_base_path: "/api/v2".to_string(),
                token_url: "/ws/oauth/token".to_string(),
                schema: Some(SchemaSource::Remote {
                    path: "/apidocs/openapi.json".to_string(),
                }),
                categories: Vec::new(),
            },
        );

        vendors.insert(
            "psa".to_string(),
            VendorConfig {
                display_name: "PSA".to_string(),
                kind: VendorKind::Psa,
                client_id: None,
                client_secret: None,
                scope: "all".to_string(),
                region: None,
                default_region: "default".to_string(),
                regions: [("default".to_string(), "https://psa.example.com".to_string())]
                    .into_iter()
                    .collect(),
                api_base_path: "/api".to_string(),
                token_url: "/auth/token".to_string(),
                schema: Some(SchemaSource::File {
                    path: "schemas/psa-openapi.json".into(),
                }),
                categories: Vec::new(),
            },
        );

        vendors.insert(
            "reporting".to_string(),
            VendorConfig {
                display_name: "Reporting".to_string(),
                kind: VendorKind::Reporting,
                client_id: None,
                client_secret: None,
                scope: "reports.read".to_string(),
                region: None,
                default_region: "default".to_string(),
                regions: [(
                    "default".to_string(),
                    "https://reports.example.com".to_string(),
                )]
                .into_iter()
                .collect(),
                api_base_path: "/v1".to_string(),
                token_url: "https://login.reports.example.com/oauth2/token".to_string(),
                schema: Some(SchemaSource::Url {
                    url: "https://reports.example.com/openapi.yaml".to_string(),
                }),
                categories: Vec::new(),
            },
        );

        Self {
            vendors,
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
