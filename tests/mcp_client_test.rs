//! MCP client integration tests
//!
//! Drives the public `JsonRpcClient`, `Session`, and `Client` APIs over the
//! in-process `FakeTransport`, with a small scripted server running on the
//! other end of the fake.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use mcpbench::error::McpBenchError;
use mcpbench::mcp::client::{start_read_loop, JsonRpcClient};
use mcpbench::mcp::session::{Session, SessionOptions, SessionState};
use mcpbench::mcp::transport::fake::{FakeTransport, FakeTransportHandle};
use mcpbench::mcp::transport::Transport;
use mcpbench::mcp::types::{Implementation, ListAllParams, ListParams, Meta};
use mcpbench::mcp::{Client, ConnectOptions};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

type Log = Arc<Mutex<Vec<(String, Value)>>>;

/// Answer every request on `handle` with `respond(method, params)`.
/// `None` leaves the request unanswered. Returns the request log.
fn serve<F>(mut handle: FakeTransportHandle, mut respond: F) -> Log
where
    F: FnMut(&str, &Value) -> Option<Value> + Send + 'static,
{
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let task_log = Arc::clone(&log);
    tokio::spawn(async move {
        while let Some(msg) = handle.next_outbound().await {
            let method = msg["method"].as_str().unwrap_or_default().to_string();
            let params = msg.get("params").cloned().unwrap_or(Value::Null);
            task_log.lock().unwrap().push((method.clone(), params.clone()));
            let Some(id) = msg.get("id").cloned() else {
                continue;
            };
            if let Some(result) = respond(&method, &params) {
                let reply = json!({ "jsonrpc": "2.0", "id": id, "result": result });
                if handle.inject(reply).is_err() {
                    break;
                }
            }
        }
    });
    log
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2025-06-18",
        "capabilities": {},
        "serverInfo": { "name": "scripted", "version": "0.0.1" }
    })
}

fn tool(name: &str) -> Value {
    json!({ "name": name, "inputSchema": {} })
}

/// `[a,b]->c1, [c]->c2, [d]->""`
fn paged_tools(method: &str, params: &Value) -> Option<Value> {
    match (method, params.get("cursor").and_then(|c| c.as_str())) {
        ("initialize", _) => Some(initialize_result()),
        ("tools/list", None) => Some(json!({ "tools": [tool("a"), tool("b")], "nextCursor": "c1" })),
        ("tools/list", Some("c1")) => Some(json!({ "tools": [tool("c")], "nextCursor": "c2" })),
        ("tools/list", Some("c2")) => Some(json!({ "tools": [tool("d")], "nextCursor": "" })),
        ("tools/list", Some(_)) => None,
        _ => Some(json!({})),
    }
}

fn options() -> ConnectOptions {
    ConnectOptions {
        session: SessionOptions {
            request_timeout: Some(Duration::from_secs(2)),
            connect_timeout: Duration::from_secs(2),
        },
        client_info: Implementation::new("mcp-client-test", "1.0.0"),
        max_pages: None,
    }
}

fn methods(log: &Log) -> Vec<String> {
    log.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
}

// ---------------------------------------------------------------------------
// JsonRpcClient
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_json_rpc_request_round_trip() {
    let (transport, handle) = FakeTransport::new();
    let _log = serve(handle, |method, _| Some(json!({ "echo": method })));

    let client = Arc::new(JsonRpcClient::new(Arc::new(transport)));
    let token = CancellationToken::new();
    start_read_loop(Arc::clone(&client), token.clone());

    let value: Value = client
        .request("tools/list", ListParams::default(), None)
        .await
        .unwrap();
    assert_eq!(value["echo"], "tools/list");
    token.cancel();
}

#[tokio::test]
async fn test_json_rpc_cancel_fails_pending_requests() {
    let (transport, handle) = FakeTransport::new();
    let _log = serve(handle, |_, _| None);

    let client = Arc::new(JsonRpcClient::new(Arc::new(transport)));
    let token = CancellationToken::new();
    start_read_loop(Arc::clone(&client), token.clone());

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.request::<_, Value>("ping", (), None).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<McpBenchError>(),
        Some(McpBenchError::ConnectionClosed)
    ));
    assert!(client.is_disconnected());
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_session_handshake_order() {
    let (transport, handle) = FakeTransport::new();
    let log = serve(handle, paged_tools);

    let session = Session::new(Arc::new(transport), SessionOptions::default());
    let err = session.list_tools(ListParams::default()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<McpBenchError>(),
        Some(McpBenchError::NotInitialized)
    ));

    session
        .initialize(Implementation::new("mcp-client-test", "1.0.0"))
        .await
        .unwrap();
    assert_eq!(session.state().await, SessionState::Ready);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        methods(&log),
        vec!["initialize".to_string(), "notifications/initialized".to_string()]
    );
}

// ---------------------------------------------------------------------------
// Client facade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_client_ordered_aggregation() {
    let (transport, handle) = FakeTransport::new();
    let log = serve(handle, paged_tools);
    let client = Client::connect_with_transport(Arc::new(transport), options())
        .await
        .unwrap();

    let all = client
        .list_all_tools(ListAllParams::default())
        .await
        .unwrap();
    let names: Vec<_> = all.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);

    let cursors: Vec<Option<String>> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(m, _)| m == "tools/list")
        .map(|(_, p)| p.get("cursor").and_then(|c| c.as_str()).map(str::to_string))
        .collect();
    assert_eq!(cursors, vec![None, Some("c1".into()), Some("c2".into())]);
}

#[tokio::test]
async fn test_client_aggregation_page_failure_times_out_whole_run() {
    let (transport, handle) = FakeTransport::new();
    let _log = serve(handle, |method, params| {
        match (method, params.get("cursor").and_then(|c| c.as_str())) {
            ("initialize", _) => Some(initialize_result()),
            ("tools/list", None) => Some(json!({ "tools": [tool("a"), tool("b")], "nextCursor": "c1" })),
            ("tools/list", Some(_)) => None,
            _ => Some(json!({})),
        }
    });
    let mut opts = options();
    opts.session.request_timeout = Some(Duration::from_millis(50));
    let client = Client::connect_with_transport(Arc::new(transport), opts)
        .await
        .unwrap();

    let err = client
        .list_all_tools(ListAllParams::default())
        .await
        .unwrap_err();
    match err.downcast_ref::<McpBenchError>() {
        Some(McpBenchError::Aggregation { page, .. }) => assert_eq!(*page, 1),
        other => panic!("expected Aggregation, got {other:?}"),
    }
    assert!(err.chain().any(|c| matches!(
        c.downcast_ref::<McpBenchError>(),
        Some(McpBenchError::Timeout { .. })
    )));
}

#[tokio::test]
async fn test_client_meta_sent_on_every_page() {
    let (transport, handle) = FakeTransport::new();
    let log = serve(handle, paged_tools);
    let client = Client::connect_with_transport(Arc::new(transport), options())
        .await
        .unwrap();

    let mut meta = Meta::new();
    meta.insert("vu".into(), json!(3));
    meta.insert("tags".into(), json!({ "run": "nightly" }));
    client
        .list_all_tools(ListAllParams {
            meta: Some(meta.clone()),
        })
        .await
        .unwrap();

    let expected = Value::Object(meta);
    let metas: Vec<Value> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(m, _)| m == "tools/list")
        .map(|(_, p)| p["_meta"].clone())
        .collect();
    assert_eq!(metas.len(), 3);
    assert!(metas.iter().all(|m| *m == expected));
}

#[tokio::test]
async fn test_client_ping_false_when_unreachable() {
    let (transport, handle) = FakeTransport::new();
    let _log = serve(handle, paged_tools);
    let fake = Arc::new(transport);
    let client = Client::connect_with_transport(fake.clone(), options())
        .await
        .unwrap();
    assert!(client.ping().await);

    fake.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!client.ping().await);
    assert_eq!(client.state().await, SessionState::Closed);
}

#[tokio::test]
async fn test_client_handshake_timeout_is_connection_error() {
    let (transport, handle) = FakeTransport::new();
    let _log = serve(handle, |_, _| None);
    let mut opts = options();
    opts.session.connect_timeout = Duration::from_millis(50);

    let err = Client::connect_with_transport(Arc::new(transport), opts)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<McpBenchError>(),
        Some(McpBenchError::Connection(_))
    ));
}
