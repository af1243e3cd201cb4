//! Tool: clear_saved_cookies - Forget the saved login.

use serde_json::{json, Value};

use crate::session::ToolContext;
use crate::types::{McpResult, ToolCallResult, ToolDefinition};

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "clear_saved_cookies".to_string(),
        description: Some("清除已保存的 Cookie 和浏览器数据".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {}
        }),
    }
}

pub async fn execute(_args: Value, ctx: ToolContext) -> McpResult<ToolCallResult> {
    match ctx.clear_cookies() {
        Ok(()) => Ok(ToolCallResult::text("✓ Cookie 和浏览器数据已清除")),
        Err(e) => Ok(ToolCallResult::error(format!("清除失败: {e}"))),
    }
}
