//! Incremental Server-Sent Events decoder
//!
//! Both network transports read `text/event-stream` bodies: the Streamable
//! HTTP transport when a POST is answered with a stream, and the legacy SSE
//! transport for its long-lived GET. This module turns arbitrarily split
//! byte chunks into complete [`SseEvent`]s.
//!
//! Field handling:
//!
//! - events end at a blank line; `\r\n`, `\r`, and `\n` all end a line
//! - `data:` lines are joined with `\n`
//! - `event:` and `id:` are captured
//! - comment lines (leading `:`) and `retry:` are ignored
//! - `event: ping` and `data: [PING]` are dropped, as are events with no data

use std::fmt::Display;
use std::ops::ControlFlow;

use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};

/// One decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Value of the `event:` field, if present.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Value of the `id:` field, if present.
    pub id: Option<String>,
}

impl SseEvent {
    /// Event type with the SSE default (`message`) applied.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Stateful decoder that buffers partial events across chunk boundaries.
///
/// # Examples
///
/// ```
/// use mcpbench::mcp::transport::sse_codec::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"data: {\"a\":").is_empty());
/// let events = decoder.push(b"1}\n\n");
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].data, r#"{"a":1}"#);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    last_event_id: Option<String>,
    /// The last byte seen was `\r`, so a following `\n` belongs to it.
    pending_cr: bool,
}

impl SseDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body and return every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        // Line endings are normalised to `\n` before framing.
        for &byte in chunk {
            match byte {
                b'\r' => {
                    self.buffer.extend_from_slice(b"\n");
                    self.pending_cr = true;
                }
                b'\n' if self.pending_cr => self.pending_cr = false,
                other => {
                    self.buffer.extend_from_slice(&[other]);
                    self.pending_cr = false;
                }
            }
        }

        let mut events = Vec::new();
        while let Some(pos) = find_blank_line(&self.buffer) {
            let block = self.buffer.split_to(pos);
            self.buffer.advance(2);
            if let Some(event) = self.decode_block(&block) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let block = self.buffer.split();
        self.decode_block(&block)
    }

    /// The most recent `id:` seen on the stream.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    fn decode_block(&mut self, block: &[u8]) -> Option<SseEvent> {
        let text = String::from_utf8_lossy(block);
        let mut data_lines: Vec<&str> = Vec::new();
        let mut event = SseEvent::default();

        for line in text.split('\n') {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => data_lines.push(value),
                "event" => event.event = Some(value.trim().to_string()),
                "id" => event.id = Some(value.trim().to_string()),
                _ => {}
            }
        }

        if let Some(ref id) = event.id {
            self.last_event_id = Some(id.clone());
        }

        if event.event_type().eq_ignore_ascii_case("ping") {
            return None;
        }

        event.data = data_lines.join("\n");
        if event.data.is_empty() || event.data.trim().eq_ignore_ascii_case("[ping]") {
            return None;
        }
        Some(event)
    }
}

fn find_blank_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Drive a byte stream through an [`SseDecoder`], handing each event to
/// `handle` until the stream ends, a chunk fails, or `handle` breaks.
pub async fn for_each_event<S, E, F>(byte_stream: S, mut handle: F)
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Display,
    F: FnMut(SseEvent) -> ControlFlow<()>,
{
    let mut decoder = SseDecoder::new();
    futures::pin_mut!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!("event stream read failed: {}", e);
                return;
            }
        };
        for event in decoder.push(&chunk) {
            if handle(event).is_break() {
                return;
            }
        }
    }

    if let Some(event) = decoder.finish() {
        let _ = handle(event);
    }
}
