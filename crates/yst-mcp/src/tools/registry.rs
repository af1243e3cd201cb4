//! Tool registration and lookup.
//!
//! Tools are registered on a [`RegistryBuilder`] during startup. Building the
//! registry freezes it: after that it is shared behind an `Arc` and only read.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::session::ToolContext;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

/// Executes one tool call.
///
/// `Err` values become JSON-RPC errors. Domain failures the caller should see
/// as a normal result go in [`ToolCallResult::error`].
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    async fn call(&self, args: Value, ctx: ToolContext) -> McpResult<ToolCallResult>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<ToolCallResult>> + Send + 'static,
{
    async fn call(&self, args: Value, ctx: ToolContext) -> McpResult<ToolCallResult> {
        (self)(args, ctx).await
    }
}

/// A registered tool: its advertised definition plus the handler.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

impl CapabilityDescriptor {
    pub fn new(definition: ToolDefinition, handler: impl ToolHandler) -> Self {
        Self {
            definition,
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        Arc::clone(&self.handler)
    }
}

impl std::fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

/// Collects tools before the server starts.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tools: Vec<CapabilityDescriptor>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Registering a name twice is a startup error.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> McpResult<()> {
        let name = descriptor.name();
        if name.is_empty() {
            return Err(McpError::StartupConfiguration(
                "Tool name must not be empty".to_string(),
            ));
        }
        if self.tools.iter().any(|t| t.name() == name) {
            return Err(McpError::StartupConfiguration(format!(
                "Tool '{name}' is registered twice"
            )));
        }
        tracing::debug!(tool = name, "Registered tool");
        self.tools.push(descriptor);
        Ok(())
    }

    /// Freeze the registry, checking that every `required` tool exists.
    pub fn build(self, required: &[String]) -> McpResult<CapabilityRegistry> {
        let index: HashMap<String, usize> = self
            .tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();

        let missing: Vec<&str> = required
            .iter()
            .filter(|name| !index.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(McpError::StartupConfiguration(format!(
                "Required tools are not registered: {}",
                missing.join(", ")
            )));
        }

        Ok(CapabilityRegistry {
            tools: self.tools,
            index,
        })
    }
}

/// Immutable name-to-tool table, in registration order.
#[derive(Debug)]
pub struct CapabilityRegistry {
    tools: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn lookup(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(CapabilityDescriptor::name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
