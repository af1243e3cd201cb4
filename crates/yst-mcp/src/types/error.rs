//! Error types and JSON-RPC error codes for the MCP server.

use serde_json::json;

use super::message::{JsonRpcError, JsonRpcErrorObject, RequestId, JSONRPC_VERSION};

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// MCP-specific error codes.
pub mod mcp_error_codes {
    /// Server: draining or stopped, request not accepted.
    pub const SERVER_SHUTTING_DOWN: i32 = -32000;
    pub const TOOL_NOT_FOUND: i32 = -32803;
}

/// All errors that can occur in the MCP server.
#[derive(thiserror::Error, Debug)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The server is draining or stopped and no longer runs new requests.
    #[error("Server is shutting down")]
    ServerShuttingDown,

    /// Invalid registry or configuration detected before serving.
    #[error("Startup configuration error: {0}")]
    StartupConfiguration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    pub fn code(&self) -> i32 {
        use error_codes::*;
        use mcp_error_codes::*;
        match self {
            McpError::ParseError(_) | McpError::Json(_) => PARSE_ERROR,
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_) => INVALID_PARAMS,
            McpError::ToolNotFound(_) => TOOL_NOT_FOUND,
            McpError::ServerShuttingDown => SERVER_SHUTTING_DOWN,
            McpError::InternalError(_)
            | McpError::StartupConfiguration(_)
            | McpError::Transport(_)
            | McpError::Io(_) => INTERNAL_ERROR,
        }
    }

    /// Stable error category carried in the `data.kind` field of error
    /// responses.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::ParseError(_) | McpError::Json(_) => "DecodeError",
            McpError::InvalidRequest(_) => "InvalidRequest",
            McpError::MethodNotFound(_) => "MethodNotFound",
            McpError::InvalidParams(_) => "InvalidParameters",
            McpError::ToolNotFound(_) => "UnknownCapability",
            McpError::ServerShuttingDown => "ServerShuttingDown",
            McpError::StartupConfiguration(_) => "StartupConfigurationError",
            McpError::InternalError(_)
            | McpError::Transport(_)
            | McpError::Io(_) => "InternalError",
        }
    }

    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcErrorObject {
                code: self.code(),
                message: self.to_string(),
                data: Some(json!({ "kind": self.kind() })),
            },
        }
    }
}

pub type McpResult<T> = Result<T, McpError>;
