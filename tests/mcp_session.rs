//! MCP client lifecycle tests against a scripted stdio server

mod common;

use common::TestFixture;
use mcpchat::mcp::{McpClient, McpError};

async fn connect(fixture: &TestFixture) -> McpClient {
    let script = fixture.create_stub_server();
    let config_path = fixture.create_servers_file("browser", &script);
    McpClient::from_config_file(&config_path)
        .await
        .expect("stub server should start")
}

#[tokio::test]
async fn handshake_lists_and_qualifies_tools() {
    let fixture = TestFixture::new();
    let client = connect(&fixture).await;

    assert!(client.has_sessions().await);
    assert_eq!(client.session_count().await, 1);

    let definitions = client.tool_definitions().await;
    assert_eq!(definitions.len(), 2);

    let mut names: Vec<String> = definitions
        .iter()
        .map(|d| d["function"]["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, ["browser__fail", "browser__navigate"]);

    for definition in &definitions {
        assert_eq!(definition["type"], "function");
        assert!(definition["function"]["parameters"].is_object());
    }

    client.close_all_sessions().await;
}

#[tokio::test]
async fn tool_call_collects_text_content() {
    let fixture = TestFixture::new();
    let client = connect(&fixture).await;

    let output = client
        .call_tool(
            "browser__navigate",
            serde_json::json!({ "url": "https://example.com" }),
        )
        .await
        .unwrap();
    assert_eq!(output, "navigated\ntitle: Example");

    client.close_all_sessions().await;
}

#[tokio::test]
async fn tool_error_reply_becomes_an_error() {
    let fixture = TestFixture::new();
    let client = connect(&fixture).await;

    let err = client
        .call_tool("browser__fail", serde_json::json!({}))
        .await
        .unwrap_err();
    match err {
        McpError::ToolFailed(message) => assert_eq!(message, "boom"),
        other => panic!("expected ToolFailed, got {other:?}"),
    }

    client.close_all_sessions().await;
}

#[tokio::test]
async fn unknown_tools_are_rejected_without_a_session_roundtrip() {
    let fixture = TestFixture::new();
    let client = connect(&fixture).await;

    // No separator at all.
    let err = client
        .call_tool("navigate", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::UnknownTool(_)));

    // Unknown server prefix.
    let err = client
        .call_tool("ghost__navigate", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::UnknownTool(_)));

    client.close_all_sessions().await;
}

#[tokio::test]
async fn close_all_sessions_drains_and_is_idempotent() {
    let fixture = TestFixture::new();
    let client = connect(&fixture).await;

    assert!(client.has_sessions().await);
    client.close_all_sessions().await;
    assert!(!client.has_sessions().await);

    // Second close finds nothing to do.
    client.close_all_sessions().await;
    assert_eq!(client.session_count().await, 0);
}

#[tokio::test]
async fn missing_servers_file_is_a_startup_error() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("does_not_exist.json");

    let err = McpClient::from_config_file(&missing).await.unwrap_err();
    assert!(matches!(err, McpError::Config { .. }));
}

#[tokio::test]
async fn malformed_servers_file_is_a_startup_error() {
    let fixture = TestFixture::new();
    let path = fixture.create_file("browser_mcp.json", "{ not json");

    let err = McpClient::from_config_file(&path).await.unwrap_err();
    assert!(matches!(err, McpError::Parse { .. }));
}

#[tokio::test]
async fn unspawnable_server_is_a_startup_error() {
    let fixture = TestFixture::new();
    let path = fixture.create_file(
        "browser_mcp.json",
        r#"{ "mcpServers": { "ghost": { "command": "/nonexistent/mcp-server-binary" } } }"#,
    );

    let err = McpClient::from_config_file(&path).await.unwrap_err();
    assert!(matches!(err, McpError::Spawn { .. }));
}

#[tokio::test]
async fn empty_servers_file_yields_a_client_without_sessions() {
    let fixture = TestFixture::new();
    let path = fixture.create_file("browser_mcp.json", r#"{ "mcpServers": {} }"#);

    let client = McpClient::from_config_file(&path).await.unwrap();
    assert!(!client.has_sessions().await);
    assert!(client.tool_definitions().await.is_empty());
}
