//! Per-vendor tool table
//!
//! Every vendor profile exposes the same six operations under its own
//! prefix. Arguments are checked against the declared input schema and then
//! decoded into a [`ToolRequest`].

use jsonschema::JSONSchema;
use msp_api_client::catalog::query::{DEFAULT_SCHEMA_LIMIT, DEFAULT_SEARCH_LIMIT};
use msp_api_client::{DetailOptions, HttpMethod, SchemaCatalog, VendorClient};
use msp_mcp_shared::{MspError, Result};
use rmcp::model::{Tool, ToolAnnotations};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ApiRequest,
    ApiOverview,
    EndpointDetails,
    SearchEndpoints,
    ListSchemas,
    GetSchema,
}

pub const OPERATIONS: [Operation; 6] = [
    Operation::ApiRequest,
    Operation::ApiOverview,
    Operation::EndpointDetails,
    Operation::SearchEndpoints,
    Operation::ListSchemas,
    Operation::GetSchema,
];

impl Operation {
    pub fn suffix(self) -> &'static str {
        match self {
            Operation::ApiRequest => "api_request",
            Operation::ApiOverview => "api_overview",
            Operation::EndpointDetails => "endpoint_details",
            Operation::SearchEndpoints => "search_endpoints",
            Operation::ListSchemas => "list_schemas",
            Operation::GetSchema => "get_schema",
        }
    }

    pub fn tool_name(self, vendor: &str) -> String {
        format!("{}_{}", vendor, self.suffix())
    }

    fn description(self, vendor: &VendorClient) -> String {
        let label = &vendor.config().display_name;
        match self {
            Operation::ApiRequest => format!(
                "Call the {label} {} REST API. `path` is relative to {}. \
                 Use the introspection tools first to find the right endpoint.",
                vendor.config().kind.label(),
                vendor.dispatcher().base_url()
            ),
            Operation::ApiOverview => format!(
                "Summarize the {label} API: endpoint count, categories and the first endpoints"
            ),
            Operation::EndpointDetails => format!(
                "Detailed operations for {label} paths containing `path_pattern` \
                 (at most 50 paths, with up to 20 referenced schemas)"
            ),
            Operation::SearchEndpoints => format!(
                "Keyword search over {label} endpoints. Every word must match."
            ),
            Operation::ListSchemas => {
                format!("List {label} data model names, filtered and paginated")
            }
            Operation::GetSchema => format!("Fetch one {label} data model by exact name"),
        }
    }

    pub fn input_schema(self) -> Value {
        match self {
            Operation::ApiRequest => json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Endpoint path, e.g. /devices/123"
                    },
                    "method": {
                        "type": "string",
                        "description": "GET, POST, PUT, PATCH or DELETE (default GET)"
                    },
                    "body": {
                        "description": "JSON body for POST, PUT and PATCH"
                    },
                    "query": {
                        "type": "object",
                        "description": "Query parameters; null values are skipped, arrays repeat the key",
                        "additionalProperties": true
                    }
                },
                "required": ["path"],
                "additionalProperties": false
            }),
            Operation::ApiOverview => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
            Operation::EndpointDetails => json!({
                "type": "object",
                "properties": {
                    "path_pattern": {
                        "type": "string",
                        "description": "Case-insensitive substring of the path, e.g. /tickets"
                    },
                    "include_schemas": {
                        "type": "boolean",
                        "description": "Include parameters, bodies, responses and referenced schemas (default true)"
                    },
                    "include_examples": {
                        "type": "boolean",
                        "description": "Keep example values (default false)"
                    },
                    "summary_only": {
                        "type": "boolean",
                        "description": "Only methods and summary per path (default false)"
                    },
                    "max_endpoints": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum paths returned (default 10, at most 50 are returned)"
                    }
                },
                "required": ["path_pattern"],
                "additionalProperties": false
            }),
            Operation::SearchEndpoints => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Space-separated keywords"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Results per page (default 20, at most 100)"
                    },
                    "skip": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Matches to skip (default 0)"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
            Operation::ListSchemas => json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Case-insensitive substring of the schema name"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Names per page (default 50, at most 500)"
                    },
                    "skip": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Matching names to skip (default 0)"
                    },
                    "list_names": {
                        "type": "boolean",
                        "description": "Return names even when more than 20 schemas match"
                    }
                },
                "additionalProperties": false
            }),
            Operation::GetSchema => json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Exact schema name"
                    }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        }
    }

    fn annotations(self) -> ToolAnnotations {
        match self {
            Operation::ApiRequest => ToolAnnotations::new()
                .read_only(false)
                .destructive(true)
                .open_world(true),
            _ => ToolAnnotations::new()
                .read_only(true)
                .idempotent(true)
                .open_world(false),
        }
    }

    pub fn tool(self, vendor: &VendorClient) -> Tool {
        let schema = match self.input_schema() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Tool::new(
            self.tool_name(vendor.name()),
            self.description(vendor),
            Arc::new(schema),
        )
        .annotate(self.annotations())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_endpoints() -> usize {
    DetailOptions::default().max_endpoints
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_schema_limit() -> usize {
    DEFAULT_SCHEMA_LIMIT
}

/// Decoded arguments of one vendor operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ToolRequest {
    ApiRequest {
        path: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default)]
        body: Option<Value>,
        #[serde(default)]
        query: Option<Map<String, Value>>,
    },
    ApiOverview {},
    EndpointDetails {
        path_pattern: String,
        #[serde(default = "default_true")]
        include_schemas: bool,
        #[serde(default)]
        include_examples: bool,
        #[serde(default)]
        summary_only: bool,
        #[serde(default = "default_max_endpoints")]
        max_endpoints: usize,
    },
    SearchEndpoints {
        query: String,
        #[serde(default = "default_search_limit")]
        limit: usize,
        #[serde(default)]
        skip: usize,
    },
    ListSchemas {
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default = "default_schema_limit")]
        limit: usize,
        #[serde(default)]
        skip: usize,
        #[serde(default)]
        list_names: bool,
    },
    GetSchema {
        name: String,
    },
}

impl ToolRequest {
    /// Tag the argument object with its operation and decode it
    pub fn decode(operation: Operation, arguments: Map<String, Value>) -> Result<Self> {
        let mut tagged = arguments;
        tagged.insert(
            "operation".to_string(),
            Value::String(operation.suffix().to_string()),
        );
        serde_json::from_value(Value::Object(tagged))
            .map_err(|e| MspError::Validation(e.to_string()))
    }
}

/// Compiled input schemas, one per operation
pub struct ArgumentValidator {
    schemas: Vec<(Operation, JSONSchema)>,
}

impl ArgumentValidator {
    pub fn new() -> Result<Self> {
        let mut schemas = Vec::with_capacity(OPERATIONS.len());
        for operation in OPERATIONS {
            let schema = operation.input_schema();
            let compiled = JSONSchema::compile(&schema).map_err(|e| {
                MspError::Config(format!("invalid input schema for {}: {e}", operation.suffix()))
            })?;
            schemas.push((operation, compiled));
        }
        Ok(Self { schemas })
    }

    pub fn validate(&self, operation: Operation, arguments: &Value) -> Result<()> {
        let Some((_, schema)) = self.schemas.iter().find(|(op, _)| *op == operation) else {
            return Ok(());
        };

        if let Err(errors) = schema.validate(arguments) {
            let problems: Vec<String> = errors
                .take(10)
                .map(|err| {
                    let location = err.instance_path.to_string();
                    if location.is_empty() {
                        err.to_string()
                    } else {
                        format!("{location}: {err}")
                    }
                })
                .collect();
            debug!("Rejected {} arguments: {:?}", operation.suffix(), problems);
            return Err(MspError::Validation(problems.join("; ")));
        }
        Ok(())
    }
}

fn catalog(vendor: &VendorClient) -> Result<&SchemaCatalog> {
    vendor.catalog().ok_or_else(|| {
        MspError::SchemaLoad(format!(
            "no API description is configured for {}",
            vendor.name()
        ))
    })
}

/// Run one decoded request against a vendor
pub async fn execute(vendor: &VendorClient, request: ToolRequest) -> Result<Value> {
    let result = match request {
        ToolRequest::ApiRequest {
            path,
            method,
            body,
            query,
        } => {
            let response = vendor
                .dispatcher()
                .request(&path, method, body.as_ref(), query.as_ref())
                .await?;
            return Ok(response.into_value());
        }
        ToolRequest::ApiOverview {} => catalog(vendor)?.overview().await?,
        ToolRequest::EndpointDetails {
            path_pattern,
            include_schemas,
            include_examples,
            summary_only,
            max_endpoints,
        } => {
            let options = DetailOptions {
                include_schemas,
                include_examples,
                summary_only,
                max_endpoints,
            };
            catalog(vendor)?
                .endpoint_details(&path_pattern, options)
                .await?
        }
        ToolRequest::SearchEndpoints { query, limit, skip } => {
            catalog(vendor)?.search(&query, limit, skip).await?
        }
        ToolRequest::ListSchemas {
            pattern,
            limit,
            skip,
            list_names,
        } => {
            catalog(vendor)?
                .list_schemas(pattern.as_deref(), limit, skip, list_names)
                .await?
        }
        ToolRequest::GetSchema { name } => return catalog(vendor)?.get_schema(&name).await,
    };

    // Memoized results are shared; the envelope needs its own copy
    Ok(Value::clone(&result))
}
