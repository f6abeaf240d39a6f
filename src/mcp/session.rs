//! MCP session lifecycle over a single transport
//!
//! A [`Session`] owns exactly one transport binding and the
//! [`JsonRpcClient`] that correlates traffic over it. It moves through
//!
//! ```text
//! Unconnected --initialize--> Handshaking --ok--> Ready --close/EOF--> Closed
//!                                  \------------failure-------------^
//! ```
//!
//! RPC methods are only valid in `Ready`. Before the handshake completes
//! they fail with [`McpBenchError::NotInitialized`]; after the session has
//! closed they fail with [`McpBenchError::ConnectionClosed`]. A session is
//! never reopened.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{McpBenchError, Result};
use crate::mcp::client::{start_read_loop, JsonRpcClient};
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    CallToolParams, CallToolResult, ClientCapabilities, GetPromptParams, GetPromptResult,
    Implementation, InitializeParams, InitializeResponse, ListParams, ListPromptsResult,
    ListResourcesResult, ListToolsResult, ReadResourceParams, ReadResourceResult,
    LATEST_PROTOCOL_VERSION, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING,
    METHOD_PROMPTS_GET, METHOD_PROMPTS_LIST, METHOD_RESOURCES_LIST, METHOD_RESOURCES_READ,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, SUPPORTED_PROTOCOL_VERSIONS,
};

/// Default deadline for the `initialize` handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built, handshake not started.
    Unconnected,
    /// `initialize` sent, waiting for the server.
    Handshaking,
    /// Handshake complete; RPC methods are valid.
    Ready,
    /// Closed by the caller, by a failed handshake, or by the peer.
    Closed,
}

/// Timing knobs for a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Deadline for each RPC after the handshake. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Deadline for the whole handshake.
    pub connect_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// One MCP session over one transport.
#[derive(Debug)]
pub struct Session {
    client: Arc<JsonRpcClient>,
    state: RwLock<SessionState>,
    options: SessionOptions,
    server_info: OnceLock<InitializeResponse>,
    read_loop: CancellationToken,
}

impl Session {
    /// Wrap `transport` in an `Unconnected` session. No I/O happens here.
    pub fn new(transport: Arc<dyn Transport>, options: SessionOptions) -> Self {
        Self {
            client: Arc::new(JsonRpcClient::new(transport)),
            state: RwLock::new(SessionState::Unconnected),
            options,
            server_info: OnceLock::new(),
            read_loop: CancellationToken::new(),
        }
    }

    /// Current lifecycle state. A `Ready` session whose transport has
    /// disconnected reports `Closed`.
    pub async fn state(&self) -> SessionState {
        let mut state = self.state.write().await;
        if *state == SessionState::Ready && self.client.is_disconnected() {
            tracing::info!("MCP transport disconnected; session closed");
            *state = SessionState::Closed;
        }
        *state
    }

    /// The server's `initialize` response, once the handshake succeeded.
    pub fn server_info(&self) -> Option<&InitializeResponse> {
        self.server_info.get()
    }

    /// Perform the `initialize` / `notifications/initialized` handshake.
    ///
    /// The whole exchange is bounded by `connect_timeout`. On any failure
    /// the transport is closed (a child process is killed), the session
    /// moves to `Closed`, and the cause is returned under a
    /// [`McpBenchError::Connection`] context. Nothing is retried.
    pub async fn initialize(&self, client_info: Implementation) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Unconnected => *state = SessionState::Handshaking,
                SessionState::Closed => return Err(McpBenchError::ConnectionClosed.into()),
                SessionState::Handshaking | SessionState::Ready => {
                    return Err(McpBenchError::Connection(
                        "initialize called on a session that already started".into(),
                    )
                    .into())
                }
            }
        }

        start_read_loop(Arc::clone(&self.client), self.read_loop.clone());

        let outcome = match tokio::time::timeout(
            self.options.connect_timeout,
            self.handshake(client_info),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(McpBenchError::Timeout {
                method: METHOD_INITIALIZE.to_string(),
            }
            .into()),
        };

        match outcome {
            Ok(response) => {
                tracing::info!(
                    server = %response.server_info.name,
                    server_version = %response.server_info.version,
                    protocol_version = %response.protocol_version,
                    "MCP session ready"
                );
                let _ = self.server_info.set(response);
                *self.state.write().await = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("MCP handshake failed: {e:#}");
                self.shutdown().await;
                Err(e.context(McpBenchError::Connection(
                    "initialize handshake failed".into(),
                )))
            }
        }
    }

    async fn handshake(&self, client_info: Implementation) -> Result<InitializeResponse> {
        let params = InitializeParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info,
        };
        let response: InitializeResponse = self
            .client
            .request(METHOD_INITIALIZE, params, None)
            .await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&response.protocol_version.as_str()) {
            return Err(McpBenchError::ProtocolVersion {
                expected: SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .map(|v| v.to_string())
                    .collect(),
                got: response.protocol_version,
            }
            .into());
        }

        self.client
            .transport()
            .set_protocol_version(&response.protocol_version)
            .await;
        self.client.notify(METHOD_INITIALIZED, ()).await?;
        Ok(response)
    }

    /// Close the session and its transport. Pending and later calls fail
    /// with [`McpBenchError::ConnectionClosed`]. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if *self.state.read().await == SessionState::Closed {
            return Ok(());
        }
        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&self) {
        *self.state.write().await = SessionState::Closed;
        self.read_loop.cancel();
        if let Err(e) = self.client.transport().close().await {
            tracing::debug!("closing MCP transport: {e:#}");
        }
    }

    async fn ensure_ready(&self) -> Result<()> {
        match self.state().await {
            SessionState::Ready => Ok(()),
            SessionState::Closed => Err(McpBenchError::ConnectionClosed.into()),
            SessionState::Unconnected | SessionState::Handshaking => {
                Err(McpBenchError::NotInitialized.into())
            }
        }
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        self.ensure_ready()
            .await
            .with_context(|| format!("{method} failed"))?;
        self.client
            .request(method, params, self.options.request_timeout)
            .await
            .with_context(|| format!("{method} failed"))
    }

    /// `true` iff the server answered `ping` without error. Failures are
    /// logged at `warn` and collapse to `false`.
    pub async fn ping(&self) -> bool {
        match self.call::<_, serde_json::Value>(METHOD_PING, ()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("MCP ping failed: {e:#}");
                false
            }
        }
    }

    /// Fetch one page of tools.
    pub async fn list_tools(&self, params: ListParams) -> Result<ListToolsResult> {
        self.call(METHOD_TOOLS_LIST, params).await
    }

    /// Fetch one page of resources.
    pub async fn list_resources(&self, params: ListParams) -> Result<ListResourcesResult> {
        self.call(METHOD_RESOURCES_LIST, params).await
    }

    /// Fetch one page of prompts.
    pub async fn list_prompts(&self, params: ListParams) -> Result<ListPromptsResult> {
        self.call(METHOD_PROMPTS_LIST, params).await
    }

    /// Invoke a tool.
    pub async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult> {
        self.call(METHOD_TOOLS_CALL, params).await
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, params: ReadResourceParams) -> Result<ReadResourceResult> {
        self.call(METHOD_RESOURCES_READ, params).await
    }

    /// Render a prompt.
    pub async fn get_prompt(&self, params: GetPromptParams) -> Result<GetPromptResult> {
        self.call(METHOD_PROMPTS_GET, params).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.read_loop.cancel();
    }
}
