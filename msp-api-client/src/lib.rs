//! MSP vendor API client - authenticated dispatch and schema introspection

pub mod catalog;
pub mod dispatcher;

pub use catalog::{CatalogState, DetailOptions, SchemaCatalog};
pub use dispatcher::{ApiResponse, HttpMethod, RequestDispatcher};

use catalog::{CategoryRules, QueryCache};
use msp_mcp_shared::{CacheConfig, CredentialManager, HttpConfig, Result, VendorConfig};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Outbound client shared by every vendor
pub fn build_http_client(http: &HttpConfig) -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(http.timeout_secs))
        .user_agent(concat!("msp-mcp/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Everything the server needs for one vendor profile
pub struct VendorClient {
    name: String,
    config: VendorConfig,
    credentials: Arc<CredentialManager>,
    dispatcher: Arc<RequestDispatcher>,
    catalog: Option<SchemaCatalog>,
}

impl VendorClient {
    pub fn new(
        name: &str,
        config: &VendorConfig,
        cache: &CacheConfig,
        client: Client,
    ) -> Result<Self> {
        let credentials = Arc::new(CredentialManager::from_vendor(name, config, client.clone())?);
        let dispatcher = Arc::new(RequestDispatcher::from_vendor(
            config,
            credentials.clone(),
            client.clone(),
        ));

        let catalog = config.schema.clone().map(|source| {
            let query_cache = if cache.enabled {
                QueryCache::new(cache.max_entries)
            } else {
                QueryCache::disabled()
            };
            SchemaCatalog::new(source, Some(dispatcher.clone()), client)
                .with_rules(CategoryRules::from_config(&config.categories))
                .with_cache(query_cache)
        });

        tracing::debug!(
            "Vendor {} dispatches to {}",
            name,
            dispatcher.base_url()
        );

        Ok(Self {
            name: name.to_string(),
            config: config.clone(),
            credentials,
            dispatcher,
            catalog,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &VendorConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn catalog(&self) -> Option<&SchemaCatalog> {
        self.catalog.as_ref()
    }
}
