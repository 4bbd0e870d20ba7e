//! Model Context Protocol (MCP) implementation.
//!
//! # Architecture
//!
//! - `protocol` - Core MCP types and message definitions
//! - `codec` - Envelope decoding and encoding
//! - `handler` - Tool handler trait and registry
//! - `session` - Per-connection state and the session table
//! - `dispatcher` - Routes inbound messages and drives the session state machine

pub mod codec;
pub mod dispatcher;
pub mod handler;
pub mod protocol;
pub mod session;

pub use codec::Message;
pub use dispatcher::Dispatcher;
pub use handler::{ToolHandler, ToolRegistry};
pub use protocol::*;
pub use session::{Session, SessionRegistry, SessionState};
