//! Server lifecycle and the shared report session.

pub mod lifecycle;
pub mod manager;

pub use lifecycle::{DrainReason, Lifecycle, LifecycleState};
pub use manager::{BrowserLoginFlow, LoginFlow, ReportSessionManager, ToolContext};
