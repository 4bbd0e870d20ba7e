//! Error types for the Portainer MCP server.

use thiserror::Error;

use crate::mcp::protocol::error_codes;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the gateway.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Startup Errors =====
    #[error("Configuration error: {0}")]
    Config(String),

    // ===== Transport Errors =====
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    // ===== MCP Errors =====
    #[error("Protocol sequencing error: {0}")]
    ProtocolSequencing(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Duplicate request id: {0}")]
    DuplicateRequest(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    // ===== Control Plane Errors =====
    #[error("API error: {status} {status_text} - {message}")]
    Api {
        status: u16,
        status_text: String,
        message: String,
    },

    #[error("Timeout: operation timed out after {millis} ms")]
    Timeout { millis: u64 },

    #[error("Cancelled: operation was cancelled")]
    Cancelled,

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an API error from HTTP response details.
    pub fn api(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            message: message.into(),
        }
    }

    /// JSON-RPC error code used when this error is sent back to a client.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::MalformedMessage(_) => error_codes::PARSE_ERROR,
            Self::DuplicateRequest(_) => error_codes::INVALID_REQUEST,
            Self::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            Self::ToolNotFound(_) | Self::InvalidToolArguments(_) => error_codes::INVALID_PARAMS,
            Self::ProtocolSequencing(_) => error_codes::SERVER_NOT_INITIALIZED,
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    /// Check if this error belongs to the transport layer rather than to a
    /// single request.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::SessionClosed(_)
                | Self::MalformedMessage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let api_err = Error::api(404, "Not Found", "Stack not found");
        assert_eq!(
            api_err.to_string(),
            "API error: 404 Not Found - Stack not found"
        );

        let config_err = Error::Config("PORTAINER_API_KEY is required".to_string());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: PORTAINER_API_KEY is required"
        );

        let tool_not_found = Error::ToolNotFound("unknown_tool".to_string());
        assert_eq!(tool_not_found.to_string(), "Tool not found: unknown_tool");
    }

    #[test]
    fn test_rpc_codes() {
        assert_eq!(
            Error::ProtocolSequencing("tools/list".into()).rpc_code(),
            error_codes::SERVER_NOT_INITIALIZED
        );
        assert_eq!(
            Error::ToolNotFound("x".into()).rpc_code(),
            error_codes::INVALID_PARAMS
        );
        assert_eq!(
            Error::InvalidToolArguments("x".into()).rpc_code(),
            error_codes::INVALID_PARAMS
        );
        assert_eq!(
            Error::MethodNotFound("x".into()).rpc_code(),
            error_codes::METHOD_NOT_FOUND
        );
        assert_eq!(
            Error::DuplicateRequest("1".into()).rpc_code(),
            error_codes::INVALID_REQUEST
        );
        assert_eq!(Error::Timeout { millis: 10_000 }.rpc_code(), error_codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::SessionNotFound("abc".into()).is_transport());
        assert!(Error::SessionClosed("abc".into()).is_transport());
        assert!(Error::MalformedMessage("eof".into()).is_transport());
        assert!(!Error::ToolNotFound("abc".into()).is_transport());
        assert!(!Error::ProtocolSequencing("tools/call".into()).is_transport());
    }

    #[test]
    fn test_timeout_and_cancelled() {
        let timeout = Error::Timeout { millis: 10_000 };
        assert_eq!(
            timeout.to_string(),
            "Timeout: operation timed out after 10000 ms"
        );

        let cancelled = Error::Cancelled;
        assert_eq!(cancelled.to_string(), "Cancelled: operation was cancelled");
    }
}
