//! In-process fake transport for MCP unit and integration tests
//!
//! [`FakeTransport::new`] returns a `(FakeTransport, FakeTransportHandle)`
//! pair. Wire the [`FakeTransport`] into the code under test; from the test
//! side use the [`FakeTransportHandle`] to:
//!
//! - read what the client sent: `handle.outbound_rx.recv().await`
//! - inject server messages: `handle.inbound_tx.send(json_string)`
//! - simulate the peer going away: `handle.disconnect()` or dropping the
//!   handle
//!
//! ```text
//! client send() -----> outbound_tx -----> outbound_rx (handle reads)
//! handle inbound_tx ----------------> inbound_rx  (client receive())
//! ```
//!
//! # Example
//!
//! ```
//! use mcpbench::mcp::transport::fake::FakeTransport;
//! use mcpbench::mcp::transport::Transport;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (transport, mut handle) = FakeTransport::new();
//!
//! transport.send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string()).await.unwrap();
//! let sent = handle.outbound_rx.recv().await.unwrap();
//! assert!(sent.contains("ping"));
//!
//! handle.inbound_tx.send(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#.to_string()).unwrap();
//! use futures::StreamExt;
//! let received = transport.receive().next().await.unwrap();
//! assert!(received.contains("result"));
//! # }
//! ```

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{McpBenchError, Result};
use crate::mcp::transport::{channel_stream, Transport};

/// In-process fake transport backed by in-memory channels.
#[derive(Debug)]
pub struct FakeTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Cancelled by `close()` on this side or `disconnect()` on the handle.
    closed: CancellationToken,
}

/// Test-side controls for a [`FakeTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Messages the client sent, in order.
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Messages to deliver to the client's `receive()` stream.
    pub inbound_tx: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
}

impl FakeTransport {
    /// Create a new `(FakeTransport, FakeTransportHandle)` pair.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let closed = CancellationToken::new();

        let transport = Self {
            outbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            closed: closed.clone(),
        };
        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
            closed,
        };
        (transport, handle)
    }
}

impl FakeTransportHandle {
    /// Simulate a permanent disconnect: the client's receive stream ends and
    /// further sends fail.
    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    /// Whether the transport was closed from either side.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the transport closes from either side.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Decode the next outbound message as JSON.
    pub async fn next_outbound(&mut self) -> Option<serde_json::Value> {
        let raw = self.outbound_rx.recv().await?;
        serde_json::from_str(&raw).ok()
    }

    /// Serialize and deliver `message` to the client.
    pub fn inject(&self, message: serde_json::Value) -> Result<()> {
        self.inbound_tx
            .send(message.to_string())
            .map_err(|_| McpBenchError::Transport("fake inbound channel closed".into()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(McpBenchError::Transport("fake transport closed".into()).into());
        }
        self.outbound_tx
            .send(message)
            .map_err(|_| McpBenchError::Transport("fake outbound channel closed".into()))?;
        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.inbound_rx), self.closed.clone())
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_reaches_handle() {
        let (transport, mut handle) = FakeTransport::new();
        transport
            .send(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#.to_string())
            .await
            .unwrap();
        let sent = handle.next_outbound().await.unwrap();
        assert_eq!(sent["method"], "ping");
    }

    #[tokio::test]
    async fn test_inject_reaches_receive() {
        let (transport, handle) = FakeTransport::new();
        handle
            .inject(serde_json::json!({"jsonrpc":"2.0","id":1,"result":{}}))
            .unwrap();
        let received = transport.receive().next().await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&received).unwrap();
        assert_eq!(v["id"], 1);
    }

    #[tokio::test]
    async fn test_messages_delivered_in_order() {
        let (transport, handle) = FakeTransport::new();
        for i in 0..3 {
            handle.inbound_tx.send(format!("{i}")).unwrap();
        }
        let mut stream = transport.receive();
        for i in 0..3 {
            assert_eq!(stream.next().await.unwrap(), format!("{i}"));
        }
    }

    #[tokio::test]
    async fn test_close_fails_send_and_ends_receive() {
        let (transport, handle) = FakeTransport::new();
        transport.close().await.unwrap();
        assert!(handle.is_closed());
        assert!(transport.send("{}".to_string()).await.is_err());
        let end = tokio::time::timeout(Duration::from_secs(1), transport.receive().next())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_ends_receive() {
        let (transport, handle) = FakeTransport::new();
        handle.disconnect();
        let end = tokio::time::timeout(Duration::from_secs(1), transport.receive().next())
            .await
            .unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_dropping_handle_ends_receive() {
        let (transport, handle) = FakeTransport::new();
        drop(handle);
        assert!(transport.receive().next().await.is_none());
    }
}
