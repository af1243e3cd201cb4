//! MCP protocol handling - JSON-RPC routing and bounded tool dispatch.

pub mod dispatcher;
pub mod handler;
pub mod negotiation;
pub mod validator;

pub use dispatcher::Dispatcher;
pub use handler::ProtocolHandler;
