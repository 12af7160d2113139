//! Tool provider for the MSP MCP server

use msp_api_client::VendorClient;
use msp_mcp_shared::{MspConfig, MspError, Result};
use rmcp::model::{CallToolResult, Content, JsonObject, Tool, ToolAnnotations};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub mod vendor;

use vendor::{ArgumentValidator, Operation, ToolRequest, OPERATIONS};

pub const STATUS_TOOL: &str = "server_status";

pub struct ToolProvider {
    config: MspConfig,
    vendors: Vec<Arc<VendorClient>>,
    routes: HashMap<String, (usize, Operation)>,
    validator: ArgumentValidator,
}

impl ToolProvider {
    pub fn new(config: MspConfig, vendors: Vec<Arc<VendorClient>>) -> Result<Self> {
        let mut routes = HashMap::new();
        for (index, vendor) in vendors.iter().enumerate() {
            for operation in OPERATIONS {
                routes.insert(operation.tool_name(vendor.name()), (index, operation));
            }
        }

        Ok(Self {
            config,
            vendors,
            routes,
            validator: ArgumentValidator::new()?,
        })
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        let mut status_schema = Map::new();
        status_schema.insert("type".to_string(), json!("object"));
        status_schema.insert("properties".to_string(), json!({}));

        let mut tools = vec![Tool::new(
            STATUS_TOOL,
            "Server version, configured vendors, token and API description state",
            Arc::new(status_schema),
        )
        .annotate(ToolAnnotations::new().read_only(true).open_world(false))];

        for vendor in &self.vendors {
            tools.extend(OPERATIONS.iter().map(|operation| operation.tool(vendor)));
        }

        debug!("Listed {} total tools", tools.len());
        tools
    }

    /// Never fails: every error becomes an error envelope
    pub async fn call_tool(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        debug!("Calling tool: {}", name);

        match self.dispatch(name, arguments).await {
            Ok(data) => success_envelope(data),
            Err(e) => {
                match &e {
                    MspError::Validation(_) | MspError::NotFound(_) => {
                        warn!("Tool {} rejected: {}", name, e)
                    }
                    _ => error!("Tool {} failed: {}", name, e),
                }
                error_envelope(&e)
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: Option<JsonObject>) -> Result<Value> {
        if name == STATUS_TOOL {
            return Ok(self.server_status().await);
        }

        let (index, operation) = *self
            .routes
            .get(name)
            .ok_or_else(|| MspError::NotFound(format!("Tool '{}' not found", name)))?;
        let vendor = &self.vendors[index];

        let arguments = arguments.unwrap_or_default();
        self.validator
            .validate(operation, &Value::Object(arguments.clone()))?;
        let request = ToolRequest::decode(operation, arguments)?;

        vendor::execute(vendor, request).await
    }

    async fn server_status(&self) -> Value {
        let mut vendors = Map::new();
        for vendor in &self.vendors {
            let config = vendor.config();
            let token = vendor.credentials().state().await;
            let catalog = vendor
                .catalog()
                .map(|c| {
                    json!({
                        "source": c.source().describe(),
                        "status": c.state()
                    })
                })
                .unwrap_or(Value::Null);

            vendors.insert(
                vendor.name().to_string(),
                json!({
                    "display_name": config.display_name,
                    "kind": config.kind,
                    "region": config.region,
                    "base_url": vendor.dispatcher().base_url(),
                    "token": token,
                    "catalog": catalog
                }),
            );
        }

        json!({
            "server": {
                "name": "msp-mcp-server",
                "version": env!("CARGO_PKG_VERSION"),
                "status": "running"
            },
            "vendors": vendors,
            "http": {
                "timeout_secs": self.config.http.timeout_secs
            },
            "cache": {
                "enabled": self.config.cache.enabled,
                "max_entries": self.config.cache.max_entries
            }
        })
    }
}

fn envelope_text(envelope: &Value) -> Content {
    let text = serde_json::to_string_pretty(envelope).unwrap_or_else(|_| envelope.to_string());
    Content::text(text)
}

pub fn success_envelope(data: Value) -> CallToolResult {
    CallToolResult::success(vec![envelope_text(&json!({
        "success": true,
        "data": data
    }))])
}

pub fn error_envelope(err: &MspError) -> CallToolResult {
    let mut envelope = json!({
        "success": false,
        "error": err.kind(),
        "message": err.to_string()
    });

    match err {
        MspError::Api { status, body, .. } => {
            envelope["status"] = json!(status);
            envelope["body"] = json!(body);
        }
        MspError::Auth { status, body, .. } => {
            envelope["status"] = json!(status);
            envelope["body"] = json!(body);
        }
        _ => {}
    }

    CallToolResult::error(vec![envelope_text(&envelope)])
}
