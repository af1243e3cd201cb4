//! Transport layer for MCP communication.

pub mod framing;
pub mod outbound;
pub mod stdio;

pub use framing::{Frame, FrameCodec, DEFAULT_MAX_FRAME_BYTES};
pub use outbound::{run_writer, OutboundSink};
pub use stdio::{shutdown_signal, StdioTransport};
