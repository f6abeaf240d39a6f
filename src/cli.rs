//! Command-line interface definition for mcpbench
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for probing a single MCP server and running a
//! load-test scenario against it.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::TransportKind;

/// mcpbench - load-testing host for Model Context Protocol servers
///
/// Connects to MCP servers over stdio, legacy SSE, or Streamable HTTP
/// and drives protocol operations against them.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcpbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "mcpbench.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for mcpbench
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect once, list everything the server offers, and disconnect
    Probe {
        #[command(flatten)]
        target: TargetArgs,

        /// Call this tool after listing
        #[arg(long)]
        call_tool: Option<String>,

        /// JSON object passed as the tool's arguments
        #[arg(long, requires = "call_tool")]
        tool_args: Option<String>,
    },

    /// Run a load-test scenario
    Run {
        /// Scenario file (YAML); overrides the config's `scenario` section
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,

        /// Number of concurrent virtual users
        #[arg(long)]
        vus: Option<usize>,

        /// Iterations per virtual user
        #[arg(long)]
        iterations: Option<usize>,
    },
}

/// Server selection flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Transport to connect with
    #[arg(short, long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Server executable (stdio transport)
    #[arg(long)]
    pub path: Option<String>,

    /// Argument for the server executable; repeat for several
    #[arg(long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Server URL (sse and streamable_http transports)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Extra HTTP header as `Name: value`; repeat for several
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Per-request timeout in seconds (network transports)
    #[arg(long)]
    pub timeout: Option<u64>,
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{}`", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in `{}`", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
