//! Shared fixtures for the server integration tests

#![allow(dead_code)]

use msp_mcp_server::MspMcpServer;
use msp_mcp_shared::{MspConfig, SchemaSource, VendorConfig, VendorKind};
use rmcp::model::{CallToolResult, JsonObject};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "rmm-client";
pub const CLIENT_SECRET: &str = "rmm-super-secret";
pub const ACCESS_TOKEN: &str = "rmm-access-token";

/// Five device paths, three ticket paths and five `*Ticket*` schemas
pub fn openapi_document() -> Value {
    json!({
        "openapi": "3.0.1",
        "info": {"title": "RMM Public API", "version": "2.0"},
        "servers": [{"url": "https://us.rmm.example.com/api/v2"}],
        "paths": {
            "/devices": {
                "get": {
                    "operationId": "getDevices",
                    "summary": "List devices",
                    "tags": ["devices"],
                    "responses": {"200": {"content": {"application/json": {
                        "schema": {"type": "array", "items": {"$ref": "#/components/schemas/Device"}}
                    }}}}
                }
            },
            "/devices/{id}": {"get": {"operationId": "getDevice", "summary": "Get a device"}},
            "/devices/{id}/activities": {"get": {"summary": "Device activities"}},
            "/devices/{id}/software": {"get": {"summary": "Installed software"}},
            "/devices/{id}/windows-services": {"get": {"summary": "Windows services"}},
            "/tickets": {
                "get": {"operationId": "listTickets", "summary": "List tickets"},
                "post": {
                    "operationId": "createTicket",
                    "summary": "Create ticket",
                    "requestBody": {"content": {"application/json": {
                        "schema": {"$ref": "#/components/schemas/NewTicket"}
                    }}}
                }
            },
            "/tickets/{id}": {"get": {"operationId": "getTicket"}},
            "/organizations": {"get": {"operationId": "listOrganizations"}}
        },
        "components": {"schemas": {
            "Device": {"type": "object", "properties": {"id": {"type": "integer"}}},
            "NewTicket": {"type": "object"},
            "TicketComment": {"type": "object"},
            "TicketStatus": {"type": "object"},
            "TicketType": {"type": "object"},
            "TicketPriority": {"type": "object"},
            "Organization": {"type": "object"}
        }}
    })
}

pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains(format!("client_id={CLIENT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "monitoring"
        })))
        .mount(server)
        .await;
}

/// One `rmm` vendor pointed at the mock server
pub fn vendor_config(server: &MockServer, schema: Option<SchemaSource>) -> VendorConfig {
    VendorConfig {
        display_name: "Device Management".to_string(),
        kind: VendorKind::DeviceManagement,
        client_id: Some(CLIENT_ID.to_string()),
        client_secret: Some(CLIENT_SECRET.to_string()),
        scope: "monitoring".to_string(),
        region: Some("us".to_string()),
        default_region: "us".to_string(),
        regions: [("us".to_string(), server.uri())].into_iter().collect(),
        api_base_path: "/api/v2".to_string(),
        token_url: "/oauth/token".to_string(),
        schema,
        categories: Vec::new(),
    }
}

pub fn config_with(vendors: Vec<(&str, VendorConfig)>) -> MspConfig {
    let mut config = MspConfig::default();
    for (name, vendor) in vendors {
        config.vendors.insert(name.to_string(), vendor);
    }
    config
}

pub fn remote_schema() -> Option<SchemaSource> {
    Some(SchemaSource::Remote {
        path: "/openapi.json".to_string(),
    })
}

pub fn server_for(config: MspConfig) -> MspMcpServer {
    MspMcpServer::new(config).unwrap()
}

pub fn args(value: Value) -> Option<JsonObject> {
    value.as_object().cloned()
}

/// Decode the JSON envelope from a tool result
pub fn envelope(result: &CallToolResult) -> Value {
    let text = result.content[0]
        .as_text()
        .map(|t| t.text.clone())
        .expect("tool results carry one text block");
    serde_json::from_str(&text).expect("envelope is JSON")
}
