//! Tool: echo - Return the arguments unchanged (connectivity check).

use serde_json::{json, Value};

use crate::session::ToolContext;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "echo".to_string(),
        description: Some("Return the given text unchanged".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to echo back" }
            },
            "required": ["text"]
        }),
    }
}

pub async fn execute(args: Value, _ctx: ToolContext) -> McpResult<ToolCallResult> {
    let text = args
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidParams("text must be a string".to_string()))?
        .to_string();

    Ok(ToolCallResult::text(text).with_structured(args))
}
