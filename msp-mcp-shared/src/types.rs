//! Shared types for vendor profiles

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What kind of service a vendor profile fronts. Only used to describe tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorKind {
    DeviceManagement,
    Psa,
    Reporting,
}

impl VendorKind {
    pub fn label(&self) -> &'static str {
        match self {
            VendorKind::DeviceManagement => "device management",
            VendorKind::Psa => "PSA/ticketing",
            VendorKind::Reporting => "reporting",
        }
    }
}

/// Where a vendor's API description comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaSource {
    /// Document bundled on disk next to the server
    File { path: PathBuf },
    /// Path under the vendor's API base, fetched with the bearer token
    Remote { path: String },
    /// Public URL, fetched without credentials
    Url { url: String },
}

impl SchemaSource {
    pub fn describe(&self) -> String {
        match self {
            SchemaSource::File { path } => format!("file:{}", path.display()),
            SchemaSource::Remote { path } => format!("remote:{path}"),
            SchemaSource::Url { url } => url.clone(),
        }
    }
}

/// One `(substring, category)` entry of an ordered categorization table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: String,
}

impl CategoryRule {
    pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            category: category.into(),
        }
    }
}

/// Region or tenant code to base URL mapping with a default entry.
///
/// Codes are case-insensitive. Unknown codes resolve to the default URL
/// rather than failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTable {
    regions: BTreeMap<String, String>,
    default_region: String,
}

impl RegionTable {
    pub fn new(regions: BTreeMap<String, String>, default_region: impl Into<String>) -> Self {
        Self {
            regions: regions
                .into_iter()
                .map(|(code, url)| (code.to_ascii_lowercase(), url))
                .collect(),
            default_region: default_region.into().to_ascii_lowercase(),
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.regions.contains_key(&code.to_ascii_lowercase())
    }

    pub fn default_url(&self) -> &str {
        self.regions
            .get(&self.default_region)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn resolve(&self, code: Option<&str>) -> &str {
        match code.and_then(|c| self.regions.get(&c.to_ascii_lowercase())) {
            Some(url) => url,
            None => {
                if let Some(code) = code {
                    tracing::debug!(
                        "Unknown region '{}', using default '{}'",
                        code,
                        self.default_region
                    );
                }
                self.default_url()
            }
        }
    }
}
