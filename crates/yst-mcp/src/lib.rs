//! YST MCP Server - daily report collection tools over stdio JSON-RPC.

pub mod config;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::{resolve_report_config, ServerConfig};
pub use protocol::ProtocolHandler;
pub use server::McpServer;
pub use session::{Lifecycle, LifecycleState, ReportSessionManager};
pub use transport::StdioTransport;
