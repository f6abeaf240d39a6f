//! Streamable HTTP transport for MCP
//!
//! [`HttpTransport`] sends every outbound JSON-RPC message as an HTTP POST
//! to a single endpoint. The server may reply with:
//!
//! - `application/json` -- a direct JSON response body
//! - `text/event-stream` -- an SSE stream carrying one or more JSON-RPC
//!   messages
//! - `202 Accepted` -- an acknowledgement with no body (notifications)
//!
//! # Session management
//!
//! The first `Mcp-Session-Id` response header seen is stored and attached
//! to every later POST. A `404` while a session is active clears it and
//! surfaces [`McpBenchError::SessionExpired`]. [`Transport::close`] sends a
//! DELETE carrying the session id so the server can release it.
//!
//! # Borrowed client
//!
//! The `reqwest::Client` is supplied by the caller and shared by handle.
//! The per-transport timeout is applied to each request through
//! [`reqwest::RequestBuilder::timeout`]; the client itself is never
//! reconfigured.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{McpBenchError, Result};
use crate::mcp::transport::sse_codec::for_each_event;
use crate::mcp::transport::{channel_stream, Transport};
use crate::mcp::types::LATEST_PROTOCOL_VERSION;

/// Header carrying the server-assigned session id.
pub const SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// Header carrying the protocol revision on every request.
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Streamable HTTP transport.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use url::Url;
/// use mcpbench::mcp::transport::http::HttpTransport;
///
/// let transport = HttpTransport::new(
///     Url::parse("http://localhost:3000/mcp").unwrap(),
///     HashMap::new(),
///     Duration::from_secs(30),
///     reqwest::Client::new(),
/// );
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    /// Borrowed HTTP client, cloned by handle.
    http_client: reqwest::Client,
    /// MCP endpoint URL (POST and DELETE target).
    endpoint: url::Url,
    /// Per-request timeout.
    timeout: Duration,
    /// Extra headers merged into every request (e.g. Authorization).
    headers: HashMap<String, String>,
    /// Active session id, captured from the first response that carries one.
    session_id: Arc<RwLock<Option<String>>>,
    /// Revision sent in `MCP-Protocol-Version`.
    protocol_version: Arc<RwLock<String>>,
    /// Sender for inbound JSON-RPC message strings.
    response_tx: mpsc::UnboundedSender<String>,
    /// Shared receiver exposed via `receive()`.
    response_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    closed: CancellationToken,
}

impl HttpTransport {
    /// Construct a transport targeting `endpoint`. No I/O happens here.
    pub fn new(
        endpoint: url::Url,
        headers: HashMap<String, String>,
        timeout: Duration,
        http_client: reqwest::Client,
    ) -> Self {
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        Self {
            http_client,
            endpoint,
            timeout,
            headers,
            session_id: Arc::new(RwLock::new(None)),
            protocol_version: Arc::new(RwLock::new(LATEST_PROTOCOL_VERSION.to_string())),
            response_tx,
            response_rx: Arc::new(Mutex::new(response_rx)),
            closed: CancellationToken::new(),
        }
    }

    /// The session id the server assigned, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// The revision currently sent in `MCP-Protocol-Version`.
    pub async fn protocol_version(&self) -> String {
        self.protocol_version.read().await.clone()
    }

    fn apply_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    /// POST one JSON-RPC message and route whatever the server answers onto
    /// the receive stream.
    ///
    /// # Errors
    ///
    /// - `401` -> [`McpBenchError::Auth`] carrying `WWW-Authenticate`
    /// - `404` with an active session -> [`McpBenchError::SessionExpired`]
    /// - any other failure -> [`McpBenchError::Transport`]
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(McpBenchError::Transport("http transport closed".into()).into());
        }

        let version = self.protocol_version().await;
        let mut req = self
            .http_client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header(PROTOCOL_VERSION_HEADER, version.as_str())
            .body(message);

        if let Some(ref id) = *self.session_id.read().await {
            req = req.header(SESSION_ID_HEADER, id.as_str());
        }
        req = self.apply_headers(req);

        let response = req
            .send()
            .await
            .map_err(|e| McpBenchError::Transport(format!("HTTP POST failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            let www_auth = response
                .headers()
                .get("WWW-Authenticate")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(McpBenchError::Auth(www_auth).into());
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            let mut sid = self.session_id.write().await;
            if sid.take().is_some() {
                return Err(McpBenchError::SessionExpired.into());
            }
            return Err(McpBenchError::Transport("HTTP 404 Not Found".into()).into());
        }

        if status == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        if !status.is_success() {
            return Err(
                McpBenchError::Transport(format!("HTTP POST returned status {}", status)).into(),
            );
        }

        if let Some(new_id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut sid = self.session_id.write().await;
            if sid.is_none() {
                tracing::debug!(session_id = new_id, "captured MCP session id");
                *sid = Some(new_id.to_string());
            }
        }

        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            let response_tx = self.response_tx.clone();
            let closed = self.closed.clone();
            let byte_stream = response.bytes_stream();
            tokio::spawn(async move {
                let pump = for_each_event(byte_stream, |event| {
                    if response_tx.send(event.data).is_err() {
                        return ControlFlow::Break(());
                    }
                    ControlFlow::Continue(())
                });
                tokio::select! {
                    _ = closed.cancelled() => {}
                    _ = pump => {}
                }
            });
        } else {
            let body = response.text().await.map_err(|e| {
                McpBenchError::Transport(format!("failed to read response body: {}", e))
            })?;
            let body = body.trim();
            if !body.is_empty() {
                let _ = self.response_tx.send(body.to_string());
            }
        }

        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.response_rx), self.closed.clone())
    }

    /// Terminate the session with a DELETE when the server assigned one.
    /// Failures are logged; the transport is closed either way.
    async fn close(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();

        let Some(sid) = self.session_id.write().await.take() else {
            return Ok(());
        };

        let version = self.protocol_version().await;
        let req = self
            .http_client
            .delete(self.endpoint.clone())
            .timeout(self.timeout)
            .header(SESSION_ID_HEADER, sid.as_str())
            .header(PROTOCOL_VERSION_HEADER, version.as_str());
        match self.apply_headers(req).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::debug!(status = %resp.status(), "session DELETE rejected");
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("session DELETE failed: {}", e),
        }
        Ok(())
    }

    async fn set_protocol_version(&self, version: &str) {
        tracing::debug!(protocol_version = version, "using negotiated protocol version");
        *self.protocol_version.write().await = version.to_string();
    }
}
