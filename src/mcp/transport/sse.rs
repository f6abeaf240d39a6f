//! Legacy HTTP+SSE transport for MCP
//!
//! [`SseTransport`] opens a long-lived GET against the server's SSE URL.
//! The server's first job on that stream is an `endpoint` event naming the
//! URL (relative or absolute) to which the client POSTs its JSON-RPC
//! messages. Responses and server-initiated messages then arrive on the
//! stream as `message` events.
//!
//! Connecting is not complete until the `endpoint` event arrives. If the
//! stream ends first, or the connect deadline passes, construction fails
//! with [`McpBenchError::Connection`].

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{McpBenchError, Result};
use crate::mcp::transport::sse_codec::for_each_event;
use crate::mcp::transport::{channel_stream, Transport};

/// Legacy SSE transport.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use url::Url;
/// use mcpbench::mcp::transport::sse::SseTransport;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = SseTransport::connect(
///     Url::parse("http://localhost:3000/sse")?,
///     HashMap::new(),
///     Duration::from_secs(30),
///     reqwest::Client::new(),
///     Duration::from_secs(30),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SseTransport {
    http_client: reqwest::Client,
    /// POST target announced by the server's `endpoint` event.
    endpoint: Url,
    timeout: Duration,
    headers: HashMap<String, String>,
    response_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Cancelled by `close()`; also stops the event-stream reader.
    closed: CancellationToken,
}

impl SseTransport {
    /// Open the event stream at `base_url` and wait for the `endpoint` event.
    ///
    /// `timeout` bounds each POST; `connect_timeout` bounds the wait for the
    /// stream to open and announce its endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`McpBenchError::Connection`] if the GET fails, the server
    /// answers with a non-success status, the stream ends before `endpoint`,
    /// the announced endpoint is on a different origin, or the deadline
    /// passes.
    pub async fn connect(
        base_url: Url,
        headers: HashMap<String, String>,
        timeout: Duration,
        http_client: reqwest::Client,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let closed = CancellationToken::new();
        let result = tokio::time::timeout(
            connect_timeout,
            Self::open(&base_url, &headers, &http_client, closed.clone()),
        )
        .await;

        let (endpoint, response_rx) = match result {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                closed.cancel();
                return Err(e);
            }
            Err(_) => {
                closed.cancel();
                return Err(McpBenchError::Connection(format!(
                    "timed out after {:?} waiting for SSE endpoint from {}",
                    connect_timeout, base_url
                ))
                .into());
            }
        };

        tracing::debug!(endpoint = %endpoint, "SSE endpoint announced");

        Ok(Self {
            http_client,
            endpoint,
            timeout,
            headers,
            response_rx: Arc::new(Mutex::new(response_rx)),
            closed,
        })
    }

    /// The resolved POST endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn open(
        base_url: &Url,
        headers: &HashMap<String, String>,
        http_client: &reqwest::Client,
        closed: CancellationToken,
    ) -> Result<(Url, mpsc::UnboundedReceiver<String>)> {
        let mut req = http_client
            .get(base_url.clone())
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");
        for (k, v) in headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req.send().await.map_err(|e| {
            McpBenchError::Connection(format!("SSE GET {} failed: {}", base_url, e))
        })?;

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
        if !status.is_success() {
            return Err(McpBenchError::Connection(format!(
                "SSE GET {} returned status {}",
                base_url, status
            ))
            .into());
        }

        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<String>();
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let pump = for_each_event(byte_stream, |event| {
                let kind = event.event_type().to_string();
                match kind.as_str() {
                    "endpoint" => {
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(event.data);
                        }
                    }
                    "message" => {
                        if response_tx.send(event.data).is_err() {
                            return ControlFlow::Break(());
                        }
                    }
                    other => tracing::debug!(event = other, "ignoring SSE event"),
                }
                ControlFlow::Continue(())
            });
            tokio::select! {
                _ = closed.cancelled() => {}
                _ = pump => tracing::debug!("SSE stream ended"),
            }
        });

        let raw = endpoint_rx.await.map_err(|_| {
            McpBenchError::Connection(format!(
                "SSE stream from {} ended before the endpoint event",
                base_url
            ))
        })?;

        let endpoint = resolve_endpoint(base_url, raw.trim())?;
        Ok((endpoint, response_rx))
    }
}

/// Resolve the announced endpoint against the SSE URL, refusing a
/// different origin.
pub fn resolve_endpoint(base_url: &Url, announced: &str) -> Result<Url> {
    let endpoint = base_url.join(announced)?;
    if endpoint.origin() != base_url.origin() {
        return Err(McpBenchError::Connection(format!(
            "SSE endpoint {} does not match origin of {}",
            endpoint, base_url
        ))
        .into());
    }
    Ok(endpoint)
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(McpBenchError::Transport("sse transport closed".into()).into());
        }

        let mut req = self
            .http_client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .body(message);
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }

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
        if !status.is_success() {
            return Err(
                McpBenchError::Transport(format!("HTTP POST returned status {}", status)).into(),
            );
        }
        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.response_rx), self.closed.clone())
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}
