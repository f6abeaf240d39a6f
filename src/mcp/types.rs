//! MCP protocol types and JSON-RPC 2.0 primitives
//!
//! This module defines the wire types used by the client session layer:
//! the handshake, `ping`, the three cursor-paged list operations, and the
//! three single-shot fetch/invoke operations. Struct fields are `camelCase`
//! on the wire via `#[serde(rename_all = "camelCase")]`, extension metadata
//! travels as `_meta`, and every `Option<>` field omits its key when `None`.
//!
//! List responses decode their items as `Vec<Option<T>>`: a server that
//! emits `null` inside the array still produces a usable page, and the
//! aggregator in [`crate::mcp::pagination`] skips the empty slots.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Protocol version constants
// ---------------------------------------------------------------------------

/// The protocol revision this client requests during `initialize`.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-11-25";

/// All protocol versions that this client accepts during negotiation.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &[LATEST_PROTOCOL_VERSION, "2025-06-18", "2025-03-26", "2024-11-05"];

// ---------------------------------------------------------------------------
// JSON-RPC method constants
// ---------------------------------------------------------------------------

/// Lifecycle: client sends `initialize` to open a session.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Lifecycle: client sends `notifications/initialized` after the server ACKs.
pub const METHOD_INITIALIZED: &str = "notifications/initialized";
/// Keepalive ping.
pub const METHOD_PING: &str = "ping";
/// Request a page of available tools.
pub const METHOD_TOOLS_LIST: &str = "tools/list";
/// Invoke a named tool.
pub const METHOD_TOOLS_CALL: &str = "tools/call";
/// Request a page of available resources.
pub const METHOD_RESOURCES_LIST: &str = "resources/list";
/// Read the contents of a resource by URI.
pub const METHOD_RESOURCES_READ: &str = "resources/read";
/// Request a page of available prompts.
pub const METHOD_PROMPTS_LIST: &str = "prompts/list";
/// Retrieve a rendered prompt by name.
pub const METHOD_PROMPTS_GET: &str = "prompts/get";

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 wire types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request object.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::types::JsonRpcRequest;
///
/// let req = JsonRpcRequest {
///     jsonrpc: "2.0".to_string(),
///     id: Some(serde_json::json!(1)),
///     method: "ping".to_string(),
///     params: None,
/// };
/// let json = serde_json::to_value(&req).unwrap();
/// assert!(json.get("params").is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Request correlation identifier. Absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// A JSON-RPC 2.0 response object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version identifier; always `"2.0"`.
    pub jsonrpc: String,
    /// Mirrors the `id` from the corresponding request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Successful result value; mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error object; mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// A JSON-RPC 2.0 error object.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::types::JsonRpcError;
///
/// let e = JsonRpcError { code: -32600, message: "Invalid Request".to_string(), data: None };
/// assert_eq!(e.to_string(), "JSON-RPC error -32600: Invalid Request");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code as defined by JSON-RPC 2.0 or MCP.
    pub code: i64,
    /// Human-readable error description.
    pub message: String,
    /// Optional additional error context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

// ---------------------------------------------------------------------------
// Identity and capabilities
// ---------------------------------------------------------------------------

/// Free-form extension metadata, carried as `_meta` on the wire.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Identifies a client or server implementation by name and version.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::types::Implementation;
///
/// let info = Implementation::new("mcpbench", "0.1.0");
/// let json = serde_json::to_string(&info).unwrap();
/// assert_eq!(json, r#"{"name":"mcpbench","version":"0.1.0"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
    /// Short name of the implementation.
    pub name: String,
    /// Version string.
    pub version: String,
    /// Optional display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Implementation {
    /// Build an identity with no title.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
        }
    }
}

/// Capabilities a client advertises. This client advertises none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Experimental capability extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<serde_json::Value>,
    /// Filesystem root capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<serde_json::Value>,
    /// LLM sampling capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<serde_json::Value>,
}

/// The capabilities a server advertises in its `initialize` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Experimental capability extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<serde_json::Value>,
    /// Server supports `logging/setLevel` and log notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<serde_json::Value>,
    /// Server supports `completion/complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<serde_json::Value>,
    /// Server exposes prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<serde_json::Value>,
    /// Server exposes resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<serde_json::Value>,
    /// Server exposes tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Initialize types
// ---------------------------------------------------------------------------

/// Parameters sent by the client in the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// The protocol version the client wishes to use.
    pub protocol_version: String,
    /// Capabilities advertised by this client.
    pub capabilities: ClientCapabilities,
    /// Information identifying this client implementation.
    pub client_info: Implementation,
}

/// Response returned by the server to an `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// The protocol version the server has selected for this session.
    pub protocol_version: String,
    /// Capabilities advertised by this server.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Information identifying this server implementation.
    pub server_info: Implementation,
    /// Optional human-readable instructions for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Parameters for a single-page list request (`tools/list`,
/// `resources/list`, `prompts/list`).
///
/// `cursor` is omitted from the wire when `None`, so the first page never
/// carries a spurious empty cursor.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::types::ListParams;
///
/// let first = serde_json::to_value(ListParams::default()).unwrap();
/// assert_eq!(first, serde_json::json!({}));
///
/// let next = serde_json::to_value(ListParams::with_cursor("abc")).unwrap();
/// assert_eq!(next, serde_json::json!({ "cursor": "abc" }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Opaque cursor from a previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Extension metadata passed through unchanged.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ListParams {
    /// Parameters that continue from `cursor`.
    pub fn with_cursor(cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            meta: None,
        }
    }
}

/// Parameters for a "list all" aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAllParams {
    /// Metadata sent unchanged on every page request of the run.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

// ---------------------------------------------------------------------------
// Tool types
// ---------------------------------------------------------------------------

/// Behavioral hints for tool display and safety classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// Display title for UI presentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When `true`, the tool only reads state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// When `true`, the tool may make irreversible changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// When `true`, repeated calls with the same arguments have no extra effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    /// When `true`, the tool may reach beyond the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// A tool exposed by an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    /// Unique name of the tool within the server.
    pub name: String,
    /// Optional display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable description of the tool's purpose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the tool's input parameters.
    #[serde(default)]
    pub input_schema: serde_json::Value,
    /// JSON Schema describing the tool's output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// Behavioral hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// One page of a `tools/list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    /// Tools in this page; `None` marks a `null` entry on the wire.
    #[serde(default)]
    pub tools: Vec<Option<McpTool>>,
    /// Opaque cursor for the next page; absent or empty on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// All tools collected by a "list all" run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAllToolsResult {
    /// Tools from every page, in server order.
    pub tools: Vec<McpTool>,
}

/// Parameters for a `tools/call` request.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::types::CallToolParams;
///
/// let p = CallToolParams::new("echo").with_arguments(serde_json::json!({ "message": "hi" }));
/// let json = serde_json::to_value(&p).unwrap();
/// assert_eq!(json["name"], "echo");
/// assert_eq!(json["arguments"]["message"], "hi");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolParams {
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments to pass to the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl CallToolParams {
    /// Call `name` with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: None,
            meta: None,
        }
    }

    /// Attach tool arguments.
    pub fn with_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = Some(arguments);
        self
    }
}

/// Response from a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// The content items produced by the tool.
    #[serde(default)]
    pub content: Vec<ToolResponseContent>,
    /// When `true`, the tool signalled an error condition within its content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    /// Structured output matching the tool's `outputSchema`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<serde_json::Value>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A single content item in a tool response, discriminated by `"type"`.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::types::ToolResponseContent;
///
/// let c: ToolResponseContent =
///     serde_json::from_value(serde_json::json!({ "type": "text", "text": "hello" })).unwrap();
/// assert_eq!(c, ToolResponseContent::Text { text: "hello".to_string() });
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolResponseContent {
    /// Plain text output.
    Text {
        /// The text content.
        text: String,
    },
    /// A base64-encoded image.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// A base64-encoded audio clip.
    Audio {
        /// Base64-encoded audio bytes.
        data: String,
        /// MIME type of the audio.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The resource contents.
        resource: ResourceContents,
    },
    /// A link to a resource the client may read separately.
    #[serde(rename = "resource_link")]
    ResourceLink {
        /// URI of the linked resource.
        uri: String,
        /// Human-readable name.
        name: String,
        /// MIME type, if known.
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Resource types
// ---------------------------------------------------------------------------

/// Text-based resource contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    /// Canonical URI that identifies this resource.
    pub uri: String,
    /// MIME type of the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// The text content of the resource.
    pub text: String,
}

/// Binary (blob) resource contents, base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    /// Canonical URI that identifies this resource.
    pub uri: String,
    /// MIME type of the binary data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Base64-encoded binary data.
    pub blob: String,
}

/// Either text or binary resource contents, told apart by `text` vs `blob`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceContents {
    /// UTF-8 text resource.
    Text(TextResourceContents),
    /// Binary resource (base64-encoded blob).
    Blob(BlobResourceContents),
}

/// Metadata describing a resource exposed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Canonical URI for this resource.
    pub uri: String,
    /// Human-readable resource name.
    pub name: String,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size of the raw content in bytes, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// One page of a `resources/list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesResult {
    /// Resources in this page; `None` marks a `null` entry on the wire.
    #[serde(default)]
    pub resources: Vec<Option<Resource>>,
    /// Opaque cursor for the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// All resources collected by a "list all" run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAllResourcesResult {
    /// Resources from every page, in server order.
    pub resources: Vec<Resource>,
}

/// Parameters for `resources/read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResourceParams {
    /// URI of the resource to read.
    pub uri: String,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ReadResourceParams {
    /// Read `uri` with no metadata.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            meta: None,
        }
    }
}

/// Response to a `resources/read` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResourceResult {
    /// One or more content objects representing the resource's current state.
    #[serde(default)]
    pub contents: Vec<ResourceContents>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

// ---------------------------------------------------------------------------
// Prompt types
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message from the human user.
    User,
    /// A message from the AI assistant.
    Assistant,
}

/// Content within a prompt message, discriminated by `"type"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    /// Plain text.
    Text {
        /// The text body.
        text: String,
    },
    /// Image data.
    Image {
        /// Base64-encoded image bytes.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Audio data.
    Audio {
        /// Base64-encoded audio bytes.
        data: String,
        /// MIME type of the audio.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// An embedded resource.
    Resource {
        /// The embedded resource contents.
        resource: ResourceContents,
    },
}

/// A single message in a prompt conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMessage {
    /// Who authored this message.
    pub role: Role,
    /// The message body.
    pub content: MessageContent,
}

/// Describes a single argument accepted by a prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description of what this argument controls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When `true`, this argument must be supplied by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Metadata describing a prompt template exposed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Unique name of this prompt.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Argument descriptors for this template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// One page of a `prompts/list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPromptsResult {
    /// Prompts in this page; `None` marks a `null` entry on the wire.
    #[serde(default)]
    pub prompts: Vec<Option<Prompt>>,
    /// Opaque cursor for the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// All prompts collected by a "list all" run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAllPromptsResult {
    /// Prompts from every page, in server order.
    pub prompts: Vec<Prompt>,
}

/// Parameters for `prompts/get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPromptParams {
    /// Name of the prompt to retrieve.
    pub name: String,
    /// Template argument substitutions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl GetPromptParams {
    /// Fetch prompt `name` with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: None,
            meta: None,
        }
    }
}

/// Response to a `prompts/get` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPromptResult {
    /// Human-readable description of what this prompt does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The rendered prompt messages.
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
    /// Optional extension metadata.
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
