//! MCP transport abstraction and implementations
//!
//! This module defines the [`Transport`] trait that every wire binding
//! satisfies. Concrete implementations live in submodules:
//!
//! - [`stdio::StdioTransport`] -- spawns a child process and communicates
//!   over its stdin/stdout pipes (newline-delimited JSON).
//! - [`sse::SseTransport`] -- legacy HTTP+SSE: a long-lived GET event
//!   stream for inbound messages and a POST endpoint for outbound ones.
//! - [`http::HttpTransport`] -- Streamable HTTP: one POST per message,
//!   answered with JSON or an event stream.
//! - [`fake::FakeTransport`] -- in-process fake for tests.
//!
//! # Design
//!
//! Callers `send` a serialized JSON-RPC string and `receive` a stream of
//! serialized JSON-RPC strings (one per logical message). Framing and
//! session bookkeeping are the responsibility of each implementation. The
//! receive stream ending means the peer is gone for good.
//!
//! ```no_run
//! use mcpbench::mcp::transport::Transport;
//! ```

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Abstraction over MCP transport implementations.
///
/// Used polymorphically through `Arc<dyn Transport>`; a session shares its
/// binding only with its own background read loop.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a complete JSON-RPC message string to the remote peer.
    ///
    /// The string MUST be a single, complete JSON object. The transport adds
    /// whatever framing the medium needs (a newline for stdio, an HTTP POST
    /// for the network bindings).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::McpBenchError::Transport`] if the underlying
    /// I/O fails, or a more specific variant (`Auth`, `SessionExpired`)
    /// where the binding can tell.
    async fn send(&self, message: String) -> Result<()>;

    /// Returns a stream of inbound JSON-RPC message strings.
    ///
    /// The stream ends when the transport is closed or the remote peer
    /// disconnects.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Release the connection. Further `send` calls fail and the receive
    /// stream ends. Calling `close` twice is harmless.
    async fn close(&self) -> Result<()>;

    /// Record the protocol revision agreed during `initialize`.
    ///
    /// Bindings that stamp the revision on each request use it from then
    /// on; the rest ignore it.
    async fn set_protocol_version(&self, _version: &str) {}
}

/// Build a receive stream over a shared channel that also ends once
/// `closed` is cancelled.
pub(crate) fn channel_stream(
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    closed: CancellationToken,
) -> Pin<Box<dyn Stream<Item = String> + Send + 'static>> {
    Box::pin(futures::stream::unfold((rx, closed), |(rx, closed)| async move {
        let item = {
            let mut guard = rx.lock().await;
            tokio::select! {
                biased;
                _ = closed.cancelled() => None,
                item = guard.recv() => item,
            }
        }?;
        Some((item, (rx, closed)))
    }))
}

pub mod fake;
pub mod http;
pub mod sse;
pub mod sse_codec;
pub mod stdio;
