//! Stdio transport for MCP child-process servers
//!
//! [`StdioTransport`] spawns a child process and talks to it over its
//! stdin/stdout pipes using newline-delimited JSON framing.
//!
//! # Protocol
//!
//! - Outbound messages are written to the child's stdin as a single JSON
//!   object followed by a newline (`\n`).
//! - Inbound messages are read from the child's stdout, one JSON object per
//!   line (newline stripped before delivery).
//! - The child's stderr is logged via `tracing::debug!` and never treated
//!   as an error condition.
//!
//! # Lifecycle
//!
//! Background Tokio tasks are started at spawn time: one writes stdin, one
//! drains stdout, one drains stderr. [`Transport::close`] kills and reaps
//! the child. When the transport is dropped without being closed a
//! best-effort SIGTERM (Unix) or `start_kill` (non-Unix) is sent instead.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{McpBenchError, Result};
use crate::mcp::transport::{channel_stream, Transport};

/// Stdio-based MCP transport that drives a child process.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use mcpbench::mcp::transport::stdio::StdioTransport;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = StdioTransport::spawn(
///     "npx".into(),
///     vec!["-y".into(), "@modelcontextprotocol/server-everything".into()],
///     HashMap::new(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    /// Sender side of the stdin channel; `send()` writes here.
    stdin_tx: mpsc::UnboundedSender<String>,
    /// Shared receiver for stdout lines (one JSON message per line).
    stdout_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Handle to the spawned child process.
    child: Arc<Mutex<Child>>,
    /// Cancelled by `close()`.
    closed: CancellationToken,
}

impl StdioTransport {
    /// Spawn a child process and wire up stdio pipes.
    ///
    /// The child inherits this process's environment with `env` applied on
    /// top, so callers only list the variables they want to add or
    /// override.
    ///
    /// # Errors
    ///
    /// Returns [`McpBenchError::Connection`] if the process cannot be
    /// spawned or its stdio pipes are unavailable.
    pub fn spawn(
        executable: PathBuf,
        args: Vec<String>,
        env: HashMap<String, String>,
    ) -> Result<Self> {
        let mut cmd = Command::new(&executable);
        cmd.args(&args)
            .envs(&env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            McpBenchError::Connection(format!(
                "failed to spawn MCP server `{}`: {}",
                executable.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpBenchError::Connection("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpBenchError::Connection("child stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpBenchError::Connection("child stderr unavailable".into()))?;

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = stdin_rx.recv().await {
                let line = format!("{}\n", msg);
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if stdout_tx.send(line.to_string()).is_err() {
                    break;
                }
            }
            tracing::debug!("mcp server stdout closed");
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("mcp server stderr: {}", line);
            }
        });

        tracing::debug!(executable = %executable.display(), "spawned MCP server");

        Ok(Self {
            stdin_tx,
            stdout_rx: Arc::new(Mutex::new(stdout_rx)),
            child: Arc::new(Mutex::new(child)),
            closed: CancellationToken::new(),
        })
    }
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(McpBenchError::Transport("stdio transport closed".into()).into());
        }
        self.stdin_tx.send(message).map_err(|e| {
            McpBenchError::Transport(format!("stdin channel closed: {}", e)).into()
        })
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.stdout_rx), self.closed.clone())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            // Already exited on its own.
            tracing::debug!("kill MCP server: {}", e);
        }
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if self.closed.is_cancelled() {
            return;
        }
        // Skip if the lock is contended; kill_on_drop still applies.
        #[cfg(unix)]
        if let Ok(child) = self.child.try_lock() {
            if let Some(pid) = child.id() {
                // SAFETY: pid is a live process ID obtained from tokio::process::Child.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
        }
        #[cfg(not(unix))]
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.start_kill();
        }
    }
}
