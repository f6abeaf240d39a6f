//! MCP stdio integration tests
//!
//! Drives a [`Client`] against the `mcp_test_server` subprocess: spawn,
//! handshake, every RPC, cursor aggregation across real pages, and the
//! peer going away.
//!
//! The test harness locates the server via the `CARGO_BIN_EXE_mcp_test_server`
//! environment variable that Cargo injects when running integration tests.

use std::path::PathBuf;
use std::time::Duration;

use mcpbench::config::ClientConfig;
use mcpbench::error::McpBenchError;
use mcpbench::mcp::types::{
    CallToolParams, GetPromptParams, ListAllParams, ListParams, Meta, MessageContent,
    ReadResourceParams, ResourceContents, ToolResponseContent,
};
use mcpbench::mcp::{Client, SessionState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns the path to the `mcp_test_server` binary.
fn test_server_exe() -> PathBuf {
    if let Ok(p) = std::env::var("CARGO_BIN_EXE_mcp_test_server") {
        return PathBuf::from(p);
    }

    if let Ok(manifest) = std::env::var("CARGO_MANIFEST_DIR") {
        let debug = PathBuf::from(manifest)
            .join("target")
            .join("debug")
            .join("mcp_test_server");
        if debug.exists() {
            return debug;
        }
    }

    PathBuf::from("mcp_test_server")
}

fn server_config() -> ClientConfig {
    let mut config = ClientConfig::stdio(test_server_exe().to_string_lossy(), vec![]);
    config.connect_timeout_seconds = 10;
    config
}

async fn connect() -> Client {
    Client::connect_stdio(&server_config())
        .await
        .expect("failed to connect to mcp_test_server -- was it built with `cargo build`?")
}

fn text_of(content: &ToolResponseContent) -> &str {
    match content {
        ToolResponseContent::Text { text } => text,
        other => panic!("expected text content, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_stdio_reaches_ready() {
    let client = connect().await;
    assert_eq!(client.state().await, SessionState::Ready);

    let info = client.server_info().expect("server info after handshake");
    assert_eq!(info.server_info.name, "mcp-test-server");
    assert_eq!(info.protocol_version, "2025-11-25");
    assert!(info.capabilities.tools.is_some());

    assert!(client.ping().await);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_list_tools_single_page() {
    let client = connect().await;
    let page = client.list_tools(ListParams::default()).await.unwrap();
    assert_eq!(page.tools.len(), 2);
    assert_eq!(page.next_cursor.as_deref(), Some("tools-2"));

    let next = client
        .list_tools(ListParams::with_cursor("tools-2"))
        .await
        .unwrap();
    assert!(next.tools[0].is_none());
    assert!(next.next_cursor.is_none());
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_list_all_tools_skips_null_entries() {
    let client = connect().await;
    let result = client
        .list_all_tools(ListAllParams::default())
        .await
        .unwrap();
    let names: Vec<_> = result.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "add", "exit"]);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_list_all_resources_and_prompts() {
    let client = connect().await;

    let mut meta = Meta::new();
    meta.insert("progressToken".into(), serde_json::json!("stdio-1"));
    let resources = client
        .list_all_resources(ListAllParams { meta: Some(meta) })
        .await
        .unwrap();
    let uris: Vec<_> = resources.resources.iter().map(|r| r.uri.as_str()).collect();
    assert_eq!(uris, vec!["test://static/1", "test://static/2"]);

    let prompts = client
        .list_all_prompts(ListAllParams::default())
        .await
        .unwrap();
    assert_eq!(prompts.prompts.len(), 1);
    assert_eq!(prompts.prompts[0].name, "greet");
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_call_tool_echo() {
    let client = connect().await;
    let result = client
        .call_tool(
            CallToolParams::new("echo").with_arguments(serde_json::json!({ "message": "hello" })),
        )
        .await
        .unwrap();
    assert_eq!(result.is_error, Some(false));
    assert_eq!(text_of(&result.content[0]), "hello");

    let sum = client
        .call_tool(CallToolParams::new("add").with_arguments(serde_json::json!({ "a": 2, "b": 3 })))
        .await
        .unwrap();
    assert_eq!(sum.structured_content.unwrap()["sum"], 5.0);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_tool_is_protocol_error() {
    let client = connect().await;
    let err = client
        .call_tool(CallToolParams::new("does-not-exist"))
        .await
        .unwrap_err();
    match err.downcast_ref::<McpBenchError>() {
        Some(McpBenchError::Protocol { code, message }) => {
            assert_eq!(*code, -32602);
            assert!(message.contains("does-not-exist"));
        }
        other => panic!("expected Protocol error, got {other:?}"),
    }
    assert!(client.ping().await);
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_read_resource_and_get_prompt() {
    let client = connect().await;

    let read = client
        .read_resource(ReadResourceParams::new("test://static/2"))
        .await
        .unwrap();
    match &read.contents[0] {
        ResourceContents::Text(text) => assert_eq!(text.text, "contents of test://static/2"),
        other => panic!("expected text contents, got {other:?}"),
    }

    let mut params = GetPromptParams::new("greet");
    params.arguments = Some([("name".to_string(), "bench".to_string())].into());
    let prompt = client.get_prompt(params).await.unwrap();
    match &prompt.messages[0].content {
        MessageContent::Text { text } => assert_eq!(text, "Hello, bench!"),
        other => panic!("expected text message, got {other:?}"),
    }
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_server_exit_closes_session() {
    let client = connect().await;

    // `exit` never answers; the call fails once stdout closes.
    let err = client
        .call_tool(CallToolParams::new("exit"))
        .await
        .unwrap_err();
    assert!(err.chain().any(|c| matches!(
        c.downcast_ref::<McpBenchError>(),
        Some(McpBenchError::ConnectionClosed)
    )));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.state().await, SessionState::Closed);
    assert!(!client.ping().await);
}

#[tokio::test]
async fn test_closed_client_rejects_calls() {
    let client = connect().await;
    client.close().await.unwrap();
    assert_eq!(client.state().await, SessionState::Closed);
    assert!(!client.ping().await);

    let err = client.list_tools(ListParams::default()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<McpBenchError>(),
        Some(McpBenchError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_unsupported_server_version_rejected() {
    let mut config = server_config();
    config
        .env
        .insert("MCP_TEST_SERVER_PROTOCOL_VERSION".into(), "2023-01-01".into());

    let err = Client::connect_stdio(&config).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<McpBenchError>(),
        Some(McpBenchError::Connection(_))
    ));
    assert!(format!("{err:#}").contains("2023-01-01"));
}

#[tokio::test]
async fn test_older_supported_version_accepted() {
    let mut config = server_config();
    config
        .env
        .insert("MCP_TEST_SERVER_PROTOCOL_VERSION".into(), "2024-11-05".into());

    let client = Client::connect_stdio(&config).await.unwrap();
    assert_eq!(client.server_info().unwrap().protocol_version, "2024-11-05");
    client.close().await.unwrap();
}
