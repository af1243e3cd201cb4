//! MCP tool implementations.

pub mod auto_collect_reports;
pub mod browser_login;
pub mod clear_saved_cookies;
pub mod echo;
pub mod generate_summary_csv;
pub mod registry;

pub use registry::{CapabilityDescriptor, CapabilityRegistry, RegistryBuilder, ToolHandler};

use crate::types::McpResult;

/// Builder holding every tool this server ships.
pub fn default_registry() -> McpResult<RegistryBuilder> {
    let mut builder = RegistryBuilder::new();
    builder.register(CapabilityDescriptor::new(
        browser_login::definition(),
        browser_login::execute,
    ))?;
    builder.register(CapabilityDescriptor::new(
        clear_saved_cookies::definition(),
        clear_saved_cookies::execute,
    ))?;
    builder.register(CapabilityDescriptor::new(
        auto_collect_reports::definition(),
        auto_collect_reports::execute,
    ))?;
    builder.register(CapabilityDescriptor::new(
        generate_summary_csv::definition(),
        generate_summary_csv::execute,
    ))?;
    builder.register(CapabilityDescriptor::new(echo::definition(), echo::execute))?;
    Ok(builder)
}
