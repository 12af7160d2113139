//! End-to-end tool dispatch against mocked vendor endpoints

mod common;

use common::*;
use msp_mcp_shared::SchemaSource;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_document(server: &MockServer, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v2/openapi.json"))
        .and(bearer_token(ACCESS_TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openapi_document())
                .set_delay(Duration::from_millis(100)),
        )
        .expect(expected_fetches)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_api_request_round_trip() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/devices"))
        .and(bearer_token(ACCESS_TOKEN))
        .and(query_param("pageSize", "5"))
        .and(query_param("df", "class=WINDOWS_SERVER"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "systemName": "srv-01"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mcp = server_for(config_with(vec![("rmm", vendor_config(&server, None))]));
    let result = mcp
        .tool_provider()
        .call_tool(
            "rmm_api_request",
            args(json!({
                "path": "/devices",
                "query": {"pageSize": 5, "df": "class=WINDOWS_SERVER", "after": null}
            })),
        )
        .await;

    assert_eq!(result.is_error, Some(false));
    let value = envelope(&result);
    assert_eq!(value["success"], true);
    assert_eq!(value["data"][0]["systemName"], "srv-01");
}

#[tokio::test]
async fn test_token_is_reused_across_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": ACCESS_TOKEN,
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/devices/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let mcp = server_for(config_with(vec![("rmm", vendor_config(&server, None))]));
    for _ in 0..2 {
        let value = envelope(
            &mcp.tool_provider()
                .call_tool(
                    "rmm_api_request",
                    args(json!({"path": "devices/9", "method": "delete"})),
                )
                .await,
        );
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], "");
    }
}

#[tokio::test]
async fn test_api_error_envelope() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v2/devices/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"error\":\"no device\"}"))
        .mount(&server)
        .await;

    let mcp = server_for(config_with(vec![("rmm", vendor_config(&server, None))]));
    let result = mcp
        .tool_provider()
        .call_tool("rmm_api_request", args(json!({"path": "/devices/404"})))
        .await;

    assert_eq!(result.is_error, Some(true));
    let value = envelope(&result);
    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "api");
    assert_eq!(value["status"], 404);
    assert_eq!(value["body"], "{\"error\":\"no device\"}");
}

#[tokio::test]
async fn test_rejected_credentials_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let mcp = server_for(config_with(vec![("rmm", vendor_config(&server, None))]));
    let result = mcp
        .tool_provider()
        .call_tool("rmm_api_request", args(json!({"path": "/devices"})))
        .await;

    let value = envelope(&result);
    assert_eq!(value["error"], "authentication");
    assert_eq!(value["status"], 401);
    assert_eq!(value["body"], "invalid_client");
    assert!(!value.to_string().contains(CLIENT_SECRET));
}

#[tokio::test]
async fn test_malformed_arguments_never_fault() {
    let server = MockServer::start().await;
    let mcp = server_for(config_with(vec![(
        "rmm",
        vendor_config(&server, remote_schema()),
    )]));
    let tools = mcp.tool_provider();

    let cases = vec![
        ("rmm_api_request", None),
        ("rmm_api_request", args(json!({"path": 42}))),
        ("rmm_api_request", args(json!({"path": "/x", "method": "TRACE"}))),
        ("rmm_search_endpoints", args(json!({"limit": 5}))),
        ("rmm_search_endpoints", args(json!({"query": "   "}))),
        ("rmm_endpoint_details", args(json!({"path_pattern": "/x", "max_endpoints": 0}))),
        ("rmm_list_schemas", args(json!({"skip": -1}))),
        ("rmm_get_schema", args(json!({"name": "Device", "verbose": true}))),
    ];

    for (name, arguments) in cases {
        let result = tools.call_tool(name, arguments).await;
        assert_eq!(result.is_error, Some(true), "{name} should fail");
        let value = envelope(&result);
        assert_eq!(value["error"], "validation", "{name}: {value}");
    }

    // Nothing reached the network
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_endpoint_details_cap_over_remote_document() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_document(&server, 1).await;

    let mcp = server_for(config_with(vec![(
        "rmm",
        vendor_config(&server, remote_schema()),
    )]));
    let tools = mcp.tool_provider();

    // Concurrent first use loads the document once
    let (details, search) = tokio::join!(
        tools.call_tool(
            "rmm_endpoint_details",
            args(json!({"path_pattern": "device", "max_endpoints": 1})),
        ),
        tools.call_tool(
            "rmm_search_endpoints",
            args(json!({"query": "ticket create"})),
        ),
    );

    let details = envelope(&details);
    assert_eq!(details["data"]["matchCount"], 1);
    assert_eq!(details["data"]["totalMatches"], 5);
    assert_eq!(details["data"]["limited"], true);
    assert_eq!(details["data"]["matches"][0]["path"], "/devices");
    assert!(details["data"]["schemas"]["Device"].is_object());

    let search = envelope(&search);
    assert_eq!(search["data"]["totalMatches"], 1);
    assert_eq!(search["data"]["matches"][0]["operationId"], "createTicket");
    assert_eq!(search["data"]["matches"][0]["category"], "Tickets");
}

#[tokio::test]
async fn test_oversized_limits_are_clamped() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_document(&server, 1).await;

    let mcp = server_for(config_with(vec![(
        "rmm",
        vendor_config(&server, remote_schema()),
    )]));
    let tools = mcp.tool_provider();

    let result = tools
        .call_tool(
            "rmm_endpoint_details",
            args(json!({"path_pattern": "device", "max_endpoints": 100})),
        )
        .await;
    assert_eq!(result.is_error, Some(false));
    let details = envelope(&result);
    assert_eq!(details["success"], true);
    assert!(details["data"]["matchCount"].as_u64().unwrap() <= 50);
    assert_eq!(details["data"]["matchCount"], 5);
    assert_eq!(details["data"]["limited"], false);

    let search = envelope(
        &tools
            .call_tool(
                "rmm_search_endpoints",
                args(json!({"query": "device", "limit": 1000})),
            )
            .await,
    );
    assert_eq!(search["success"], true);
    assert_eq!(search["data"]["hasMore"], false);
}

#[tokio::test]
async fn test_list_and_get_schemas() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_document(&server, 1).await;

    let mcp = server_for(config_with(vec![(
        "rmm",
        vendor_config(&server, remote_schema()),
    )]));
    let tools = mcp.tool_provider();

    let listing = envelope(
        &tools
            .call_tool(
                "rmm_list_schemas",
                args(json!({"pattern": "Ticket", "limit": 2, "skip": 1})),
            )
            .await,
    );
    assert_eq!(listing["data"]["matches"], json!(["TicketComment", "TicketStatus"]));
    assert_eq!(listing["data"]["totalMatches"], 5);
    assert_eq!(listing["data"]["hasMore"], true);

    let schema = envelope(&tools.call_tool("rmm_get_schema", args(json!({"name": "Device"}))).await);
    assert_eq!(schema["data"]["schema"]["properties"]["id"]["type"], "integer");

    let missing = envelope(&tools.call_tool("rmm_get_schema", args(json!({"name": "ticket"}))).await);
    assert_eq!(missing["error"], "not_found");
    assert!(missing["message"].as_str().unwrap().contains("TicketStatus"));
}

#[tokio::test]
async fn test_overview_and_status() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_document(&server, 1).await;

    let mcp = server_for(config_with(vec![(
        "rmm",
        vendor_config(&server, remote_schema()),
    )]));
    let tools = mcp.tool_provider();

    let before = envelope(&tools.call_tool("server_status", None).await);
    assert_eq!(before["data"]["vendors"]["rmm"]["catalog"]["status"]["state"], "unloaded");
    assert_eq!(before["data"]["vendors"]["rmm"]["token"]["cached"], false);

    let overview = envelope(&tools.call_tool("rmm_api_overview", args(json!({}))).await);
    assert_eq!(overview["data"]["totalEndpoints"], 9);
    assert_eq!(overview["data"]["info"]["title"], "RMM Public API");
    assert!(overview["data"]["categories"]
        .as_array()
        .unwrap()
        .contains(&json!("Organizations")));

    let after = envelope(&tools.call_tool("server_status", None).await);
    let rmm = &after["data"]["vendors"]["rmm"];
    assert_eq!(rmm["catalog"]["status"]["state"], "loaded");
    assert_eq!(rmm["catalog"]["status"]["endpoints"], 9);
    assert_eq!(rmm["token"]["valid"], true);

    let text = after.to_string();
    assert!(!text.contains(CLIENT_SECRET));
    assert!(!text.contains(ACCESS_TOKEN));
}

#[tokio::test]
async fn test_failed_document_load_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.yaml"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    mount_token_endpoint(&server).await;

    let schema = Some(SchemaSource::Url {
        url: format!("{}/broken.yaml", server.uri()),
    });
    let mcp = server_for(config_with(vec![("rmm", vendor_config(&server, schema))]));
    let tools = mcp.tool_provider();

    for _ in 0..2 {
        let value = envelope(&tools.call_tool("rmm_api_overview", None).await);
        assert_eq!(value["error"], "schema_load");
    }

    // Raw requests are unaffected
    let value = envelope(&tools.call_tool("rmm_api_request", args(json!({"path": "/devices"}))).await);
    assert_eq!(value["success"], true);

    let status = envelope(&tools.call_tool("server_status", None).await);
    assert_eq!(status["data"]["vendors"]["rmm"]["catalog"]["status"]["state"], "failed");
}

#[tokio::test]
async fn test_vendor_without_description() {
    let server = MockServer::start().await;
    let mcp = server_for(config_with(vec![("psa", vendor_config(&server, None))]));

    let value = envelope(
        &mcp.tool_provider()
            .call_tool("psa_search_endpoints", args(json!({"query": "ticket"})))
            .await,
    );
    assert_eq!(value["error"], "schema_load");
}

#[tokio::test]
async fn test_tool_listing() {
    let server = MockServer::start().await;
    let mcp = server_for(config_with(vec![
        ("rmm", vendor_config(&server, remote_schema())),
        ("psa", vendor_config(&server, None)),
    ]));

    let names: Vec<String> = mcp
        .tool_provider()
        .list_tools()
        .into_iter()
        .map(|t| t.name.to_string())
        .collect();

    assert_eq!(names.len(), 13);
    assert_eq!(names[0], "server_status");
    for expected in [
        "psa_api_request",
        "rmm_api_overview",
        "rmm_endpoint_details",
        "rmm_search_endpoints",
        "rmm_list_schemas",
        "rmm_get_schema",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
}
