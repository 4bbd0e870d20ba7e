//! Portainer MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server that lets remote clients discover and
//! call a small set of Portainer stack operations over a long-lived HTTP/SSE
//! connection.
//!
//! # Architecture
//!
//! 1. **Portainer Layer** (`portainer`) - API client for the Portainer control plane
//! 2. **Tools Layer** (`tools`) - `list_stacks` and `get_stack_file`
//! 3. **MCP Layer** (`mcp`) - Envelope codec, sessions, dispatcher, tool registry
//! 4. **HTTP Layer** (`http`) - SSE push channel and the inbound message route
//!
//! # Request flow
//!
//! `GET /sse` creates a session. The client posts envelopes to
//! `/messages/?session_id=...`; the dispatcher advances the session state
//! machine, runs tool handlers on their own tasks, and enqueues each response
//! on the session, which the SSE stream drains in order.

pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod metrics;
pub mod portainer;
pub mod tools;

pub use error::{Error, Result};

/// Server version reported in `initialize`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name reported in `initialize`.
pub const SERVER_NAME: &str = "portainer-manager";
