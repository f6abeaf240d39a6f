//! Configuration management for mcpbench
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! The precedence is file (or defaults when the file is missing), then
//! `MCPBENCH_*` environment variables, then command-line flags.

use crate::cli::{Cli, Commands, TargetArgs};
use crate::error::{McpBenchError, Result};
use crate::mcp::types::Meta;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for mcpbench
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Which wire transport to connect with
    #[serde(default)]
    pub transport: TransportKind,

    /// Connection parameters for the MCP server
    #[serde(default)]
    pub client: ClientConfig,

    /// Settings for the shared HTTP client used by network transports
    #[serde(default)]
    pub http: HttpClientConfig,

    /// Load-test scenario run by `mcpbench run`
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

/// Wire transport selection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Local subprocess speaking newline-delimited JSON over stdio
    #[default]
    Stdio,
    /// Legacy HTTP+SSE (GET event stream plus POST endpoint)
    Sse,
    /// Streamable HTTP (single POST endpoint)
    StreamableHttp,
}

impl TransportKind {
    /// `true` for transports that talk HTTP.
    pub fn is_network(self) -> bool {
        !matches!(self, TransportKind::Stdio)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Sse => "sse",
            TransportKind::StreamableHttp => "streamable_http",
        };
        f.write_str(name)
    }
}

impl FromStr for TransportKind {
    type Err = McpBenchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "sse" => Ok(TransportKind::Sse),
            "streamable_http" | "http" => Ok(TransportKind::StreamableHttp),
            other => Err(McpBenchError::Config(format!(
                "Invalid transport: {}. Must be one of: stdio, sse, streamable_http",
                other
            ))),
        }
    }
}

/// Transport-selection parameters for one MCP client
///
/// Subprocess fields (`path`, `args`, `env`) are used by the stdio
/// transport; `base_url`, `headers`, and `timeout_seconds` by the network
/// transports. Collection fields default to empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Executable to spawn for the stdio transport
    #[serde(default)]
    pub path: String,

    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the child, applied over the inherited one
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Server URL for the network transports
    #[serde(default)]
    pub base_url: String,

    /// Extra headers sent on every HTTP request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout for network transports (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Deadline for connecting (seconds). Covers the handshake, and for
    /// SSE also the wait for the `endpoint` event.
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Optional ceiling on pages fetched by one "list all" run
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Client name sent in the handshake
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Client version sent in the handshake
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_connect_timeout_seconds() -> u64 {
    30
}

fn default_client_name() -> String {
    "mcpbench".to_string()
}

fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            base_url: String::new(),
            headers: HashMap::new(),
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            max_pages: None,
            client_name: default_client_name(),
            client_version: default_client_version(),
        }
    }
}

impl ClientConfig {
    /// Subprocess configuration for `path` with `args`.
    pub fn stdio(path: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            path: path.into(),
            args,
            ..Self::default()
        }
    }

    /// Network configuration for `base_url`.
    pub fn network(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Per-request timeout for network transports.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Handshake deadline.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Parse `base_url`, requiring an absolute `http` or `https` URL.
    ///
    /// # Errors
    ///
    /// Returns [`McpBenchError::Config`] if the URL is empty, malformed, or
    /// uses another scheme.
    pub fn parsed_base_url(&self) -> Result<url::Url> {
        if self.base_url.trim().is_empty() {
            return Err(McpBenchError::Config(
                "base_url is required for network transports".to_string(),
            )
            .into());
        }
        let url = url::Url::parse(self.base_url.trim()).map_err(|e| {
            McpBenchError::Config(format!("Invalid base_url {}: {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(McpBenchError::Config(format!(
                "base_url must use http or https, got {}",
                url.scheme()
            ))
            .into());
        }
        Ok(url)
    }

    /// Validate the fields `kind` needs, before any I/O.
    pub fn validate_for(&self, kind: TransportKind) -> Result<()> {
        match kind {
            TransportKind::Stdio => {
                if self.path.trim().is_empty() {
                    return Err(McpBenchError::Config(
                        "path is required for the stdio transport".to_string(),
                    )
                    .into());
                }
            }
            TransportKind::Sse | TransportKind::StreamableHttp => {
                self.parsed_base_url()?;
                if self.timeout_seconds == 0 {
                    return Err(McpBenchError::Config(
                        "timeout_seconds must be greater than 0".to_string(),
                    )
                    .into());
                }
            }
        }

        if self.connect_timeout_seconds == 0 {
            return Err(McpBenchError::Config(
                "connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.max_pages == Some(0) {
            return Err(
                McpBenchError::Config("max_pages must be greater than 0".to_string()).into(),
            );
        }

        Ok(())
    }
}

/// Settings for the `reqwest::Client` shared by network transports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`
    #[serde(default = "default_true")]
    pub proxy_from_env: bool,

    /// Speak HTTP/1.1 only
    #[serde(default = "default_true")]
    pub http1_only: bool,

    /// Open a fresh connection for every request
    #[serde(default)]
    pub no_connection_reuse: bool,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// `User-Agent` header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("mcpbench/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            proxy_from_env: true,
            http1_only: true,
            no_connection_reuse: false,
            accept_invalid_certs: false,
            user_agent: default_user_agent(),
        }
    }
}

/// A load-test scenario: every virtual user runs `steps` in order,
/// `iterations` times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Number of concurrent virtual users
    #[serde(default = "default_vus")]
    pub vus: usize,

    /// Iterations per virtual user
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Pause between iterations (milliseconds)
    #[serde(default)]
    pub pause_ms: u64,

    /// Steps executed per iteration
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

fn default_vus() -> usize {
    1
}

fn default_iterations() -> usize {
    1
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            vus: default_vus(),
            iterations: default_iterations(),
            pause_ms: 0,
            steps: Vec::new(),
        }
    }
}

impl ScenarioConfig {
    /// Load a standalone scenario file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            McpBenchError::Config(format!(
                "Failed to read scenario file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| McpBenchError::Config(format!("Failed to parse scenario: {}", e)).into())
    }
}

/// One protocol operation in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// `ping`
    Ping,
    /// One page of `tools/list`
    ListTools {
        #[serde(default)]
        cursor: Option<String>,
    },
    /// One page of `resources/list`
    ListResources {
        #[serde(default)]
        cursor: Option<String>,
    },
    /// One page of `prompts/list`
    ListPrompts {
        #[serde(default)]
        cursor: Option<String>,
    },
    /// Every page of `tools/list`
    ListAllTools {
        #[serde(default)]
        meta: Option<Meta>,
    },
    /// Every page of `resources/list`
    ListAllResources {
        #[serde(default)]
        meta: Option<Meta>,
    },
    /// Every page of `prompts/list`
    ListAllPrompts {
        #[serde(default)]
        meta: Option<Meta>,
    },
    /// `tools/call`
    CallTool {
        name: String,
        #[serde(default)]
        arguments: Option<serde_json::Value>,
    },
    /// `resources/read`
    ReadResource { uri: String },
    /// `prompts/get`
    GetPrompt {
        name: String,
        #[serde(default)]
        arguments: Option<HashMap<String, String>>,
    },
}

impl ScenarioStep {
    /// Label used in the run summary.
    pub fn label(&self) -> String {
        match self {
            ScenarioStep::Ping => "ping".to_string(),
            ScenarioStep::ListTools { .. } => "tools/list".to_string(),
            ScenarioStep::ListResources { .. } => "resources/list".to_string(),
            ScenarioStep::ListPrompts { .. } => "prompts/list".to_string(),
            ScenarioStep::ListAllTools { .. } => "tools/list (all)".to_string(),
            ScenarioStep::ListAllResources { .. } => "resources/list (all)".to_string(),
            ScenarioStep::ListAllPrompts { .. } => "prompts/list (all)".to_string(),
            ScenarioStep::CallTool { name, .. } => format!("tools/call {}", name),
            ScenarioStep::ReadResource { uri } => format!("resources/read {}", uri),
            ScenarioStep::GetPrompt { name, .. } => format!("prompts/get {}", name),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns [`McpBenchError::Config`] if the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| McpBenchError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| McpBenchError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(transport) = std::env::var("MCPBENCH_TRANSPORT") {
            match transport.parse() {
                Ok(kind) => self.transport = kind,
                Err(_) => tracing::warn!("Invalid MCPBENCH_TRANSPORT: {}", transport),
            }
        }

        if let Ok(path) = std::env::var("MCPBENCH_PATH") {
            self.client.path = path;
        }

        if let Ok(args) = std::env::var("MCPBENCH_ARGS") {
            self.client.args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Ok(base_url) = std::env::var("MCPBENCH_BASE_URL") {
            self.client.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("MCPBENCH_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.client.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid MCPBENCH_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("MCPBENCH_CONNECT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.client.connect_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid MCPBENCH_CONNECT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(max_pages) = std::env::var("MCPBENCH_MAX_PAGES") {
            if let Ok(value) = max_pages.parse() {
                self.client.max_pages = Some(value);
            } else {
                tracing::warn!("Invalid MCPBENCH_MAX_PAGES: {}", max_pages);
            }
        }

        if let Ok(vus) = std::env::var("MCPBENCH_VUS") {
            if let Ok(value) = vus.parse() {
                self.scenario.vus = value;
            } else {
                tracing::warn!("Invalid MCPBENCH_VUS: {}", vus);
            }
        }

        if let Ok(iterations) = std::env::var("MCPBENCH_ITERATIONS") {
            if let Ok(value) = iterations.parse() {
                self.scenario.iterations = value;
            } else {
                tracing::warn!("Invalid MCPBENCH_ITERATIONS: {}", iterations);
            }
        }

        if let Ok(flag) = std::env::var("MCPBENCH_HTTP1_ONLY") {
            match parse_bool(&flag) {
                Some(value) => self.http.http1_only = value,
                None => tracing::warn!("Invalid MCPBENCH_HTTP1_ONLY: {}", flag),
            }
        }

        if let Ok(flag) = std::env::var("MCPBENCH_NO_CONNECTION_REUSE") {
            match parse_bool(&flag) {
                Some(value) => self.http.no_connection_reuse = value,
                None => tracing::warn!("Invalid MCPBENCH_NO_CONNECTION_REUSE: {}", flag),
            }
        }

        if let Ok(flag) = std::env::var("MCPBENCH_INSECURE") {
            match parse_bool(&flag) {
                Some(value) => self.http.accept_invalid_certs = value,
                None => tracing::warn!("Invalid MCPBENCH_INSECURE: {}", flag),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        match &cli.command {
            Commands::Probe { target, .. } => self.apply_target(target),
            Commands::Run {
                target,
                vus,
                iterations,
                ..
            } => {
                self.apply_target(target);
                if let Some(vus) = vus {
                    self.scenario.vus = *vus;
                }
                if let Some(iterations) = iterations {
                    self.scenario.iterations = *iterations;
                }
            }
        }
    }

    fn apply_target(&mut self, target: &TargetArgs) {
        if let Some(kind) = target.transport {
            self.transport = kind;
        }
        if let Some(ref path) = target.path {
            self.client.path = path.clone();
        }
        if !target.args.is_empty() {
            self.client.args = target.args.clone();
        }
        if let Some(ref base_url) = target.base_url {
            self.client.base_url = base_url.clone();
        }
        for (name, value) in &target.headers {
            self.client.headers.insert(name.clone(), value.clone());
        }
        if let Some(timeout) = target.timeout {
            self.client.timeout_seconds = timeout;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`McpBenchError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.client.validate_for(self.transport)?;

        if self.scenario.vus == 0 {
            return Err(
                McpBenchError::Config("scenario.vus must be greater than 0".to_string()).into(),
            );
        }

        if self.scenario.vus > 10_000 {
            return Err(McpBenchError::Config(
                "scenario.vus must be less than or equal to 10000".to_string(),
            )
            .into());
        }

        if self.scenario.iterations == 0 {
            return Err(McpBenchError::Config(
                "scenario.iterations must be greater than 0".to_string(),
            )
            .into());
        }

        if self.http.user_agent.trim().is_empty() {
            return Err(
                McpBenchError::Config("http.user_agent cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
