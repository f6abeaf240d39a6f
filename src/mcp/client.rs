//! Transport-backed async JSON-RPC 2.0 client
//!
//! [`JsonRpcClient`] correlates requests with responses over any
//! [`Transport`]. Outbound messages go straight to [`Transport::send`], so a
//! failed write surfaces on the call that made it. Inbound messages are
//! consumed by [`start_read_loop`], which classifies each one and dispatches
//! accordingly.
//!
//! # Design
//!
//! - Request ids come from a monotonically increasing `u64` counter.
//! - In-flight requests are tracked in a `pending` map keyed by id. Each
//!   entry is a `oneshot::Sender` that receives the `result` or `error`
//!   value when the matching response arrives.
//! - When the transport's receive stream ends, or the loop's
//!   [`CancellationToken`] fires, the client is marked disconnected and all
//!   pending senders are dropped so awaiting callers fail with
//!   [`McpBenchError::ConnectionClosed`] rather than hanging.
//! - Server-initiated `ping` requests are answered with an empty result.
//!   Any other server request gets JSON-RPC `-32601 Method not found`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{McpBenchError, Result};
use crate::mcp::transport::Transport;
use crate::mcp::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, METHOD_PING};

/// The pending-response map type: maps request ID to the oneshot sender.
type PendingMap =
    HashMap<u64, oneshot::Sender<std::result::Result<serde_json::Value, JsonRpcError>>>;

/// Async JSON-RPC 2.0 client bound to one transport.
///
/// Create one with [`JsonRpcClient::new`], then call [`start_read_loop`]
/// before issuing requests.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use mcpbench::mcp::client::{start_read_loop, JsonRpcClient};
/// use mcpbench::mcp::transport::fake::FakeTransport;
///
/// # #[tokio::main]
/// # async fn main() {
/// let (transport, _handle) = FakeTransport::new();
/// let client = Arc::new(JsonRpcClient::new(Arc::new(transport)));
/// let token = CancellationToken::new();
/// let read_loop = start_read_loop(Arc::clone(&client), token.clone());
/// token.cancel();
/// read_loop.await.unwrap();
/// assert!(client.is_disconnected());
/// # }
/// ```
pub struct JsonRpcClient {
    next_id: AtomicU64,
    pending: Mutex<PendingMap>,
    transport: Arc<dyn Transport>,
    /// Cancelled when the read loop exits.
    disconnected: CancellationToken,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("transport", &self.transport)
            .field("disconnected", &self.disconnected.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a client over `transport`. No I/O happens until a request is
    /// made.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            transport,
            disconnected: CancellationToken::new(),
        }
    }

    /// The transport this client writes to.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// `true` once the read loop has exited.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.is_cancelled()
    }

    /// Send a JSON-RPC request and await the typed response.
    ///
    /// A `params` value that serializes to `null` (e.g. `()`) is omitted
    /// from the request. With `timeout` set to `None` the call waits until a
    /// response arrives or the connection goes away.
    ///
    /// # Errors
    ///
    /// - [`McpBenchError::ConnectionClosed`] if the read loop has exited or
    ///   exits before the response arrives.
    /// - [`McpBenchError::Timeout`] if `timeout` elapses.
    /// - [`McpBenchError::Protocol`] if the server answers with an error.
    /// - Whatever [`Transport::send`] returns if the write fails.
    /// - [`McpBenchError::Serialization`] if the result does not decode
    ///   into `R`.
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let params = serde_json::to_value(params)?;
        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: (!params.is_null()).then_some(params),
        })?;

        // Register before sending so the response cannot beat us.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.is_disconnected() {
            self.pending.lock().await.remove(&id);
            return Err(McpBenchError::ConnectionClosed.into());
        }

        tracing::debug!(id, method, "sending MCP request");
        if let Err(e) = self.transport.send(message).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let outcome = match timeout {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    return Err(McpBenchError::Timeout {
                        method: method.to_string(),
                    }
                    .into());
                }
            },
            None => rx.await,
        };

        let rpc_result = outcome.map_err(|_| McpBenchError::ConnectionClosed)?;
        let value = rpc_result.map_err(|e| McpBenchError::Protocol {
            code: e.code,
            message: e.message,
        })?;

        serde_json::from_value(value).map_err(|e| McpBenchError::Serialization(e).into())
    }

    /// Send a JSON-RPC notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns [`McpBenchError::ConnectionClosed`] after the read loop has
    /// exited, or the transport's error if the write fails.
    pub async fn notify<P: serde::Serialize + Send>(&self, method: &str, params: P) -> Result<()> {
        if self.is_disconnected() {
            return Err(McpBenchError::ConnectionClosed.into());
        }
        let params = serde_json::to_value(params)?;
        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params: (!params.is_null()).then_some(params),
        })?;
        self.transport.send(message).await
    }
}

/// Start the JSON-RPC read loop as a background Tokio task.
///
/// The loop reads the transport's receive stream and dispatches each
/// message:
///
/// - **Response** (has `"id"` and `"result"` or `"error"`): resolves the
///   matching pending sender.
/// - **Server-initiated request** (has `"id"` and `"method"`): `ping` is
///   answered with `{}`; anything else with `-32601`.
/// - **Notification** (has `"method"` but no `"id"`): logged and ignored.
///
/// The loop ends when the stream ends or `cancellation` fires. Either way
/// the client is marked disconnected and pending requests are failed.
pub fn start_read_loop(
    client: Arc<JsonRpcClient>,
    cancellation: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let transport = Arc::clone(&client.transport);
        let mut inbound = transport.receive();
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = inbound.next() => {
                    match maybe_msg {
                        Some(raw) => dispatch_message(&raw, &client).await,
                        None => {
                            tracing::debug!("MCP transport receive stream ended");
                            break;
                        }
                    }
                }
            }
        }

        client.disconnected.cancel();
        client.pending.lock().await.clear();
    })
}

/// Classify and dispatch a single inbound JSON string.
async fn dispatch_message(raw: &str, client: &Arc<JsonRpcClient>) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("MCP read loop: failed to parse inbound JSON: {e}");
            return;
        }
    };

    let has_id = value.get("id").map_or(false, |id| !id.is_null());
    let has_method = value.get("method").is_some();
    let has_result = value.get("result").is_some();
    let has_error = value.get("error").is_some();

    if has_id && (has_result || has_error) && !has_method {
        handle_response(value, client).await;
    } else if has_id && has_method {
        handle_server_request(value, client);
    } else if has_method {
        let method = value["method"].as_str().unwrap_or_default();
        tracing::debug!("MCP read loop: ignoring notification '{method}'");
    } else {
        tracing::debug!(
            "MCP read loop: received unclassifiable message; ignoring. \
             has_id={has_id} has_method={has_method} has_result={has_result} has_error={has_error}"
        );
    }
}

/// Resolve a pending request sender with the response value or error.
async fn handle_response(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    let id_val = &value["id"];
    let id = match id_val
        .as_u64()
        .or_else(|| id_val.as_str().and_then(|s| s.parse().ok()))
    {
        Some(id) => id,
        None => {
            tracing::warn!("MCP read loop: response has non-integer id: {id_val}");
            return;
        }
    };

    let Some(tx) = client.pending.lock().await.remove(&id) else {
        tracing::debug!("MCP read loop: received response for unknown id {id}; ignoring");
        return;
    };

    let outcome = match value.get("error") {
        Some(error_val) => Err(serde_json::from_value::<JsonRpcError>(error_val.clone())
            .unwrap_or_else(|_| JsonRpcError {
                code: -32603,
                message: format!("malformed error object: {error_val}"),
                data: None,
            })),
        None => Ok(value
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null)),
    };

    // The caller may have already timed out.
    let _ = tx.send(outcome);
}

/// Answer a server-initiated request without blocking the read loop.
fn handle_server_request(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    let method = value
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    let id = value.get("id").cloned();

    let response = if method == METHOD_PING {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(serde_json::json!({})),
            error: None,
        }
    } else {
        tracing::debug!("MCP read loop: rejecting server request '{method}'");
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {method}"),
                data: None,
            }),
        }
    };

    let Ok(serialized) = serde_json::to_string(&response) else {
        return;
    };
    let transport = Arc::clone(&client.transport);
    tokio::spawn(async move {
        if let Err(e) = transport.send(serialized).await {
            tracing::debug!("failed to answer server request '{method}': {e}");
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
