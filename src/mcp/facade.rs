//! Connected MCP client handle
//!
//! [`Client`] is what the rest of the program talks to. Each constructor
//! validates a [`ClientConfig`], builds one transport, and completes the
//! handshake before returning, so a `Client` in hand is always past
//! `initialize`. On top of the per-page session operations it provides the
//! "list all" aggregations.
//!
//! # Example
//!
//! ```no_run
//! use mcpbench::config::ClientConfig;
//! use mcpbench::mcp::types::ListAllParams;
//! use mcpbench::mcp::Client;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = ClientConfig::stdio("npx", vec!["-y".into(), "server-everything".into()]);
//! let client = Client::connect_stdio(&config).await?;
//! let tools = client.list_all_tools(ListAllParams::default()).await?;
//! println!("{} tools", tools.tools.len());
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ClientConfig, TransportKind};
use crate::error::{McpBenchError, Result};
use crate::mcp::pagination::collect_all;
use crate::mcp::session::{Session, SessionOptions, SessionState};
use crate::mcp::transport::http::HttpTransport;
use crate::mcp::transport::sse::SseTransport;
use crate::mcp::transport::stdio::StdioTransport;
use crate::mcp::transport::Transport;
use crate::mcp::types::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, Implementation,
    InitializeResponse, ListAllParams, ListAllPromptsResult, ListAllResourcesResult,
    ListAllToolsResult, ListParams, ListPromptsResult, ListResourcesResult, ListToolsResult,
    ReadResourceParams, ReadResourceResult,
};

/// Everything a [`Client`] needs besides the transport.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Session timing.
    pub session: SessionOptions,
    /// Identity sent in the handshake.
    pub client_info: Implementation,
    /// Ceiling on pages per "list all" run.
    pub max_pages: Option<usize>,
}

impl ConnectOptions {
    /// Options derived from `config`, with the given per-call timeout.
    pub fn from_config(config: &ClientConfig, request_timeout: Option<Duration>) -> Self {
        Self {
            session: SessionOptions {
                request_timeout,
                connect_timeout: config.connect_timeout(),
            },
            client_info: Implementation::new(&config.client_name, &config.client_version),
            max_pages: config.max_pages,
        }
    }
}

/// A connected MCP client.
#[derive(Debug)]
pub struct Client {
    session: Session,
    max_pages: Option<usize>,
}

impl Client {
    /// Spawn `config.path` and handshake over its stdio.
    ///
    /// Calls wait for their response without a per-call deadline; only the
    /// handshake is bounded.
    pub async fn connect_stdio(config: &ClientConfig) -> Result<Self> {
        config.validate_for(TransportKind::Stdio)?;
        let transport = StdioTransport::spawn(
            PathBuf::from(&config.path),
            config.args.clone(),
            config.env.clone(),
        )?;
        tracing::info!(path = %config.path, "Connecting to MCP server over stdio");
        Self::connect_with_transport(
            Arc::new(transport),
            ConnectOptions::from_config(config, None),
        )
        .await
    }

    /// Open the legacy SSE stream at `config.base_url` and handshake.
    ///
    /// Waiting for the `endpoint` event and the handshake share one
    /// `connect_timeout` deadline.
    pub async fn connect_sse(config: &ClientConfig, http_client: reqwest::Client) -> Result<Self> {
        config.validate_for(TransportKind::Sse)?;
        let base_url = config.parsed_base_url()?;
        tracing::info!(url = %base_url, "Connecting to MCP server over SSE");
        let started = Instant::now();
        let transport = SseTransport::connect(
            base_url,
            config.headers.clone(),
            config.timeout(),
            http_client,
            config.connect_timeout(),
        )
        .await?;

        let mut options = ConnectOptions::from_config(config, Some(config.timeout()));
        options.session.connect_timeout = config
            .connect_timeout()
            .saturating_sub(started.elapsed());
        Self::connect_with_transport(Arc::new(transport), options).await
    }

    /// Handshake with the Streamable HTTP endpoint at `config.base_url`.
    pub async fn connect_streamable_http(
        config: &ClientConfig,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        config.validate_for(TransportKind::StreamableHttp)?;
        let endpoint = config.parsed_base_url()?;
        tracing::info!(url = %endpoint, "Connecting to MCP server over Streamable HTTP");
        let transport = HttpTransport::new(
            endpoint,
            config.headers.clone(),
            config.timeout(),
            http_client,
        );
        Self::connect_with_transport(
            Arc::new(transport),
            ConnectOptions::from_config(config, Some(config.timeout())),
        )
        .await
    }

    /// Dispatch on `kind`. Network transports require `http_client`.
    pub async fn connect(
        config: &ClientConfig,
        kind: TransportKind,
        http_client: Option<reqwest::Client>,
    ) -> Result<Self> {
        match (kind, http_client) {
            (TransportKind::Stdio, _) => Self::connect_stdio(config).await,
            (TransportKind::Sse, Some(http)) => Self::connect_sse(config, http).await,
            (TransportKind::StreamableHttp, Some(http)) => {
                Self::connect_streamable_http(config, http).await
            }
            (kind, None) => Err(McpBenchError::Config(format!(
                "the {} transport needs an HTTP client",
                kind
            ))
            .into()),
        }
    }

    /// Handshake over an already-built transport.
    pub async fn connect_with_transport(
        transport: Arc<dyn Transport>,
        options: ConnectOptions,
    ) -> Result<Self> {
        let session = Session::new(transport, options.session);
        session.initialize(options.client_info).await?;
        Ok(Self {
            session,
            max_pages: options.max_pages,
        })
    }

    /// The server's handshake response.
    pub fn server_info(&self) -> Option<&InitializeResponse> {
        self.session.server_info()
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        self.session.state().await
    }

    /// Close the session. Later calls fail with `ConnectionClosed`.
    pub async fn close(&self) -> Result<()> {
        self.session.close().await
    }

    /// `true` iff the server answered `ping`.
    pub async fn ping(&self) -> bool {
        self.session.ping().await
    }

    pub async fn list_tools(&self, params: ListParams) -> Result<ListToolsResult> {
        self.session.list_tools(params).await
    }

    pub async fn list_resources(&self, params: ListParams) -> Result<ListResourcesResult> {
        self.session.list_resources(params).await
    }

    pub async fn list_prompts(&self, params: ListParams) -> Result<ListPromptsResult> {
        self.session.list_prompts(params).await
    }

    pub async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult> {
        self.session.call_tool(params).await
    }

    pub async fn read_resource(&self, params: ReadResourceParams) -> Result<ReadResourceResult> {
        self.session.read_resource(params).await
    }

    pub async fn get_prompt(&self, params: GetPromptParams) -> Result<GetPromptResult> {
        self.session.get_prompt(params).await
    }

    /// Every tool across all pages, in server order.
    pub async fn list_all_tools(&self, params: ListAllParams) -> Result<ListAllToolsResult> {
        let session = &self.session;
        let tools = collect_all(params.meta, self.max_pages, move |page| {
            session.list_tools(page)
        })
        .await?;
        Ok(ListAllToolsResult { tools })
    }

    /// Every resource across all pages, in server order.
    pub async fn list_all_resources(
        &self,
        params: ListAllParams,
    ) -> Result<ListAllResourcesResult> {
        let session = &self.session;
        let resources = collect_all(params.meta, self.max_pages, move |page| {
            session.list_resources(page)
        })
        .await?;
        Ok(ListAllResourcesResult { resources })
    }

    /// Every prompt across all pages, in server order.
    pub async fn list_all_prompts(&self, params: ListAllParams) -> Result<ListAllPromptsResult> {
        let session = &self.session;
        let prompts = collect_all(params.meta, self.max_pages, move |page| {
            session.list_prompts(page)
        })
        .await?;
        Ok(ListAllPromptsResult { prompts })
    }
}
