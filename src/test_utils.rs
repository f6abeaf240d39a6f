//! Test utilities for mcpbench
//!
//! Temporary-file helpers for configuration tests and a scripted in-process
//! MCP server that answers requests arriving on a
//! [`FakeTransportHandle`](crate::mcp::transport::fake::FakeTransportHandle).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::error::McpBenchError;
use crate::mcp::transport::fake::FakeTransportHandle;

/// Client name used by handshakes in unit tests.
pub const TEST_CLIENT_NAME: &str = "mcpbench-test";

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content and return its path
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Display of the first [`McpBenchError`] found in an error, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<String> {
    err.downcast_ref::<McpBenchError>().map(|e| e.to_string())
}

/// A minimal successful `initialize` result.
pub fn initialize_result(protocol_version: &str) -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": {}, "resources": {}, "prompts": {} },
        "serverInfo": { "name": "fake-server", "version": "1.0.0" }
    })
}

/// How the fake server answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with this `result`.
    Result(serde_json::Value),
    /// Respond with a JSON-RPC error.
    Error(i64, String),
    /// Never respond.
    Silence,
}

/// A request or notification the fake server received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub params: serde_json::Value,
}

/// Handle to a running scripted server.
#[derive(Debug)]
pub struct FakeServer {
    log: Arc<Mutex<Vec<RecordedRequest>>>,
    closed: CancellationToken,
}

impl FakeServer {
    /// Every message with a `method` received so far, waiting briefly for
    /// in-flight ones to be recorded.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.log.lock().unwrap().clone()
    }

    /// Recorded requests for one method.
    pub async fn requests_for(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// Drop the connection from the server side.
    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    /// Whether the client closed the transport.
    pub fn transport_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Spawn a task that answers every request on `handle` with `respond`.
/// Notifications are recorded but not answered.
pub fn spawn_fake_server<F>(mut handle: FakeTransportHandle, mut respond: F) -> FakeServer
where
    F: FnMut(&str, &serde_json::Value) -> Reply + Send + 'static,
{
    let log = Arc::new(Mutex::new(Vec::new()));
    let closed = handle.closed_token();
    let task_log = Arc::clone(&log);
    let task_closed = closed.clone();

    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = task_closed.cancelled() => break,
                msg = handle.next_outbound() => msg,
            };
            let Some(msg) = msg else { break };
            let Some(method) = msg.get("method").and_then(|m| m.as_str()) else {
                continue;
            };
            let params = msg.get("params").cloned().unwrap_or_default();
            task_log.lock().unwrap().push(RecordedRequest {
                method: method.to_string(),
                params: params.clone(),
            });

            let Some(id) = msg.get("id").cloned() else {
                continue;
            };
            let response = match respond(method, &params) {
                Reply::Result(result) => {
                    serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": result })
                }
                Reply::Error(code, message) => serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": code, "message": message }
                }),
                Reply::Silence => continue,
            };
            if handle.inject(response).is_err() {
                break;
            }
        }
        // Keep the inbound side open until the transport is closed so that
        // the client sees a live connection.
        task_closed.cancelled().await;
    });

    FakeServer { log, closed }
}
