//! Error types for mcpbench
//!
//! This module defines all error types used throughout the crate, using
//! `thiserror` for ergonomic error handling. The variants map onto the error
//! taxonomy of the client session layer: configuration, connection,
//! protocol, transport, lifecycle, and aggregation failures.

use thiserror::Error;

/// Main error type for mcpbench operations
///
/// Every error returned by the session layer is (or wraps) one of these
/// variants, so callers can distinguish a bad configuration from a failed
/// handshake, a server-side error payload, or a broken pipe by downcasting
/// the `anyhow::Error`:
///
/// ```
/// use mcpbench::error::McpBenchError;
///
/// let err: anyhow::Error = McpBenchError::ConnectionClosed.into();
/// let err = err.context("tools/list failed");
/// assert!(matches!(
///     err.downcast_ref::<McpBenchError>(),
///     Some(McpBenchError::ConnectionClosed)
/// ));
/// ```
#[derive(Error, Debug)]
pub enum McpBenchError {
    /// Malformed or missing configuration, detected before any I/O
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport construction or handshake failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server answered a request with a JSON-RPC error payload
    #[error("MCP protocol error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code
        code: i64,
        /// Error message reported by the server
        message: String,
    },

    /// The server selected a protocol revision this client does not speak
    #[error("MCP protocol version mismatch: expected one of {expected:?}, got {got}")]
    ProtocolVersion {
        /// Protocol revisions the client accepts
        expected: Vec<String>,
        /// Revision the server selected
        got: String,
    },

    /// The Streamable HTTP server no longer recognises our session id
    #[error("MCP session expired")]
    SessionExpired,

    /// I/O failure while moving a message over the wire
    #[error("MCP transport error: {0}")]
    Transport(String),

    /// No response arrived before the request deadline
    #[error("MCP timeout waiting for response to {method}")]
    Timeout {
        /// The JSON-RPC method that timed out
        method: String,
    },

    /// The server rejected our credentials (HTTP 401)
    #[error("MCP authentication required: {0}")]
    Auth(String),

    /// An RPC method was called before the handshake completed
    #[error("not initialized")]
    NotInitialized,

    /// An RPC method was called after the session closed
    #[error("connection closed")]
    ConnectionClosed,

    /// A page request failed in the middle of a "list all" run
    #[error("aggregation failed on page {page}: {message}")]
    Aggregation {
        /// Zero-based index of the page that failed
        page: usize,
        /// Description of the underlying failure
        message: String,
    },

    /// A "list all" run needed more pages than the configured ceiling
    #[error("pagination limit of {limit} pages exceeded")]
    PaginationLimit {
        /// The configured page ceiling
        limit: usize,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl McpBenchError {
    /// Returns `true` for errors that mean the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpBenchError::Connection(_)
                | McpBenchError::ConnectionClosed
                | McpBenchError::SessionExpired
        )
    }
}

/// Result type alias for mcpbench operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = McpBenchError::Config("path must not be empty".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: path must not be empty"
        );
    }

    #[test]
    fn test_lifecycle_error_display() {
        assert_eq!(McpBenchError::NotInitialized.to_string(), "not initialized");
        assert_eq!(
            McpBenchError::ConnectionClosed.to_string(),
            "connection closed"
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let error = McpBenchError::Protocol {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "MCP protocol error -32601: Method not found"
        );
    }

    #[test]
    fn test_protocol_version_error_display() {
        let error = McpBenchError::ProtocolVersion {
            expected: vec!["2025-11-25".to_string()],
            got: "1999-01-01".to_string(),
        };
        let s = error.to_string();
        assert!(s.contains("2025-11-25"));
        assert!(s.contains("1999-01-01"));
    }

    #[test]
    fn test_aggregation_error_display() {
        let error = McpBenchError::Aggregation {
            page: 1,
            message: "connection closed".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "aggregation failed on page 1: connection closed"
        );
    }

    #[test]
    fn test_is_fatal() {
        assert!(McpBenchError::ConnectionClosed.is_fatal());
        assert!(McpBenchError::Connection("spawn".into()).is_fatal());
        assert!(!McpBenchError::Transport("reset".into()).is_fatal());
        assert!(!McpBenchError::NotInitialized.is_fatal());
    }

    #[test]
    fn test_downcast_through_context() {
        let err: anyhow::Error = McpBenchError::Timeout {
            method: "ping".to_string(),
        }
        .into();
        let err = err.context("ping failed");
        assert!(matches!(
            err.downcast_ref::<McpBenchError>(),
            Some(McpBenchError::Timeout { .. })
        ));
        assert_eq!(err.to_string(), "ping failed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error: McpBenchError = io_error.into();
        assert!(matches!(error, McpBenchError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: McpBenchError = json_error.into();
        assert!(matches!(error, McpBenchError::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<McpBenchError>();
    }
}
