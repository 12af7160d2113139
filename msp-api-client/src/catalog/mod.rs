//! Introspection over one vendor's API description
//!
//! The document is loaded lazily on first use and exactly once. Concurrent
//! first callers wait on the same load; a failed load is remembered and the
//! catalog stays unusable for the rest of the process.

pub mod cache;
pub mod categorize;
pub mod document;
pub mod query;

pub use cache::{QueryCache, QueryKey};
pub use categorize::{CategoryRules, DEFAULT_CATEGORY};
pub use document::{Endpoint, SchemaDocument};
pub use query::{
    DetailOptions, EndpointDetails, EndpointSummary, Overview, QueryResult, SchemaListing,
};

use crate::dispatcher::RequestDispatcher;
use msp_mcp_shared::{MspError, Result, SchemaSource};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Load state reported by `server_status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CatalogState {
    Unloaded,
    Loaded { endpoints: usize, schemas: usize },
    Failed { reason: String },
}

type LoadOutcome = std::result::Result<Arc<SchemaDocument>, String>;

pub struct SchemaCatalog {
    source: SchemaSource,
    dispatcher: Option<Arc<RequestDispatcher>>,
    client: Client,
    rules: CategoryRules,
    cache: QueryCache,
    document: OnceCell<LoadOutcome>,
}

impl SchemaCatalog {
    /// `dispatcher` is required for `remote` sources
    pub fn new(
        source: SchemaSource,
        dispatcher: Option<Arc<RequestDispatcher>>,
        client: Client,
    ) -> Self {
        Self {
            source,
            dispatcher,
            client,
            rules: CategoryRules::builtin(),
            cache: QueryCache::disabled(),
            document: OnceCell::new(),
        }
    }

    /// Catalog over an already parsed document
    pub fn preloaded(document: SchemaDocument) -> Self {
        let title = document.title().unwrap_or("inline").to_string();
        Self {
            source: SchemaSource::Url { url: title },
            dispatcher: None,
            client: Client::new(),
            rules: CategoryRules::builtin(),
            cache: QueryCache::disabled(),
            document: OnceCell::new_with(Some(Ok(Arc::new(document)))),
        }
    }

    pub fn with_rules(mut self, rules: CategoryRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    pub fn state(&self) -> CatalogState {
        match self.document.get() {
            None => CatalogState::Unloaded,
            Some(Ok(doc)) => CatalogState::Loaded {
                endpoints: doc.endpoint_count(),
                schemas: doc.schemas.len(),
            },
            Some(Err(reason)) => CatalogState::Failed {
                reason: reason.clone(),
            },
        }
    }

    /// The parsed document, loading it on first call
    pub async fn load(&self) -> Result<Arc<SchemaDocument>> {
        let outcome = self
            .document
            .get_or_init(|| async {
                match self.fetch_and_parse().await {
                    Ok(doc) => {
                        info!(
                            "Loaded API description from {} ({} paths, {} schemas)",
                            self.source.describe(),
                            doc.paths.len(),
                            doc.schemas.len()
                        );
                        Ok(Arc::new(doc))
                    }
                    Err(e) => {
                        error!(
                            "Failed to load API description from {}: {}",
                            self.source.describe(),
                            e
                        );
                        Err(match e {
                            MspError::SchemaLoad(reason) => reason,
                            other => other.to_string(),
                        })
                    }
                }
            })
            .await;

        outcome.clone().map_err(MspError::SchemaLoad)
    }

    async fn fetch_and_parse(&self) -> Result<SchemaDocument> {
        let origin = self.source.describe();
        let content = match &self.source {
            SchemaSource::File { path } => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| MspError::SchemaLoad(format!("{origin}: {e}")))?,
            SchemaSource::Remote { path } => {
                let dispatcher = self.dispatcher.as_ref().ok_or_else(|| {
                    MspError::SchemaLoad(format!("{origin}: no dispatcher for remote source"))
                })?;
                dispatcher
                    .fetch_text(path)
                    .await
                    .map_err(|e| MspError::SchemaLoad(format!("{origin}: {e}")))?
            }
            SchemaSource::Url { url } => self.fetch_public(url).await?,
        };
        SchemaDocument::parse(&content, &origin)
    }

    async fn fetch_public(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MspError::SchemaLoad(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MspError::SchemaLoad(format!("{url}: HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| MspError::SchemaLoad(format!("{url}: {e}")))
    }

    pub async fn overview(&self) -> Result<Arc<Value>> {
        let doc = self.load().await?;
        self.memoized(QueryKey::Overview, || {
            serde_json::to_value(query::overview(&doc, &self.rules))
        })
    }

    pub async fn endpoint_details(
        &self,
        path_pattern: &str,
        options: DetailOptions,
    ) -> Result<Arc<Value>> {
        let doc = self.load().await?;
        let options = options.normalized();
        let key = QueryKey::Details {
            pattern: path_pattern.to_lowercase(),
            options,
        };
        self.memoized(key, || {
            serde_json::to_value(query::endpoint_details(&doc, path_pattern, options))
        })
    }

    pub async fn search(&self, text: &str, limit: usize, skip: usize) -> Result<Arc<Value>> {
        let terms = query::search_terms(text)?;
        let doc = self.load().await?;
        let limit = limit.min(query::MAX_SEARCH_LIMIT);
        let key = QueryKey::Search {
            terms: terms.clone(),
            limit,
            skip,
        };
        self.memoized(key, || {
            serde_json::to_value(query::search(&doc, &self.rules, &terms, limit, skip))
        })
    }

    pub async fn list_schemas(
        &self,
        pattern: Option<&str>,
        limit: usize,
        skip: usize,
        list_names: bool,
    ) -> Result<Arc<Value>> {
        let doc = self.load().await?;
        let limit = limit.min(query::MAX_SCHEMA_LIMIT);
        let key = QueryKey::Schemas {
            pattern: pattern.map(str::to_lowercase),
            limit,
            skip,
            list_names,
        };
        self.memoized(key, || {
            serde_json::to_value(query::list_schemas(&doc, pattern, limit, skip, list_names))
        })
    }

    pub async fn get_schema(&self, name: &str) -> Result<Value> {
        let doc = self.load().await?;
        query::get_schema(&doc, name)
    }

    pub fn categorize(&self, path: &str) -> &str {
        self.rules.categorize(path)
    }

    fn memoized<F>(&self, key: QueryKey, compute: F) -> Result<Arc<Value>>
    where
        F: FnOnce() -> serde_json::Result<Value>,
    {
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        self.cache.insert(key, value.clone());
        Ok(value)
    }
}
