//! MCP (Model Context Protocol) client
//!
//! Targets protocol revision **2025-11-25** and accepts servers speaking
//! 2025-06-18, 2025-03-26, or 2024-11-05.
//!
//! # Module Layout
//!
//! - `types`      -- protocol types and JSON-RPC primitives
//! - `transport`  -- `Transport` trait with stdio, SSE, Streamable HTTP, and
//!   fake implementations
//! - `client`     -- transport-agnostic JSON-RPC 2.0 request correlation
//! - `session`    -- handshake state machine and the per-page RPC surface
//! - `pagination` -- cursor-following "list all" aggregation
//! - `facade`     -- the connected [`Client`] handle

pub mod client;
pub mod facade;
pub mod pagination;
pub mod session;
pub mod transport;
pub mod types;

pub use facade::{Client, ConnectOptions};
pub use session::{SessionOptions, SessionState};
