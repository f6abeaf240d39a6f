//! mcpbench - Model Context Protocol client and load-testing host
//!
//! This library provides an MCP client session layer that a load-testing
//! host drives: transports for stdio, legacy SSE, and Streamable HTTP; the
//! `initialize` handshake state machine; cursor-following aggregation of the
//! paged list operations; and a connected client facade.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `mcp`: transports, JSON-RPC correlation, sessions, pagination, and the
//!   `Client` facade
//! - `host`: construction of the shared HTTP client
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: the `probe` and `run` command handlers
//!
//! # Example
//!
//! ```no_run
//! use mcpbench::config::{ClientConfig, TransportKind};
//! use mcpbench::mcp::types::ListAllParams;
//! use mcpbench::mcp::Client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::network("http://localhost:3000/mcp");
//!     let http = mcpbench::host::build_http_client(&Default::default())?;
//!     let client = Client::connect(&config, TransportKind::StreamableHttp, Some(http)).await?;
//!
//!     let tools = client.list_all_tools(ListAllParams::default()).await?;
//!     println!("{} tools", tools.tools.len());
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod mcp;

// Re-export commonly used types
pub use config::{ClientConfig, Config, TransportKind};
pub use error::{McpBenchError, Result};
pub use mcp::Client;

#[cfg(test)]
pub mod test_utils;
