//! Main MCP server implementation on the rmcp framework

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, ServiceExt};

use msp_api_client::{build_http_client, VendorClient};
use msp_mcp_shared::{MspConfig, Result};

use crate::tools::ToolProvider;

#[derive(Clone)]
pub struct MspMcpServer {
    tool_provider: Arc<ToolProvider>,
    instructions: String,
}

impl MspMcpServer {
    /// Build every vendor client up front. Nothing touches the network until
    /// the first tool call.
    pub fn new(config: MspConfig) -> Result<Self> {
        info!("Initializing MSP MCP Server");

        let client = build_http_client(&config.http)?;
        let mut vendors = Vec::with_capacity(config.vendors.len());
        for (name, vendor) in &config.vendors {
            let vendor_client = VendorClient::new(name, vendor, &config.cache, client.clone())?;
            info!(
                "Registered vendor {} ({}) at {}",
                name,
                vendor.display_name,
                vendor_client.dispatcher().base_url()
            );
            vendors.push(Arc::new(vendor_client));
        }

        let instructions = instructions(&config);
        let tool_provider = Arc::new(ToolProvider::new(config, vendors)?);

        Ok(Self {
            tool_provider,
            instructions,
        })
    }

    pub fn tool_provider(&self) -> &ToolProvider {
        &self.tool_provider
    }

    /// Serve MCP over stdin/stdout until the client disconnects
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting MCP server with stdio transport");
        let service = self.serve(rmcp::transport::stdio()).await?;
        let reason = service.waiting().await?;
        info!("MCP session ended: {:?}", reason);
        Ok(())
    }
}

fn instructions(config: &MspConfig) -> String {
    let vendors: Vec<String> = config
        .vendors
        .iter()
        .map(|(name, v)| format!("{name} ({})", v.display_name))
        .collect();
    format!(
        "MSP API gateway for: {}. API descriptions are large; use <vendor>_api_overview, \
         <vendor>_search_endpoints and <vendor>_endpoint_details to find an endpoint, \
         then <vendor>_api_request to call it. server_status reports token and catalog state.",
        vendors.join(", ")
    )
}

impl ServerHandler for MspMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "msp-mcp-server".to_string(),
                title: Some("MSP MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(self.instructions.clone()),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = std::result::Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            debug!("Listing tools");
            let tools = self.tool_provider.list_tools();
            debug!("Found {} tools", tools.len());
            Ok(ListToolsResult::with_all_items(tools))
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = std::result::Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let result = self
                .tool_provider
                .call_tool(&request.name, request.arguments)
                .await;
            debug!(
                "Tool {} finished (error: {})",
                request.name,
                result.is_error.unwrap_or(false)
            );
            Ok(result)
        }
    }
}
