//! Tool: auto_collect_reports - Collect a month range, logging in first when
//! the saved cookies are missing or expired.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::ToolContext;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::browser_login::{default_timeout, timeout_secs, DEFAULT_LOGIN_TIMEOUT_SECS};

#[derive(Debug, Deserialize)]
struct CollectParams {
    start_month: String,
    end_month: String,
    #[serde(default)]
    output_file: Option<String>,
    #[serde(default = "default_timeout", deserialize_with = "timeout_secs")]
    login_timeout: u64,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "auto_collect_reports".to_string(),
        description: Some("自动采集日报数据（如果未登录会自动启动浏览器登录）".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "start_month": {
                    "type": "string",
                    "description": "起始月份，格式 YYYY-MM (例如: 2025-01)"
                },
                "end_month": {
                    "type": "string",
                    "description": "结束月份，格式 YYYY-MM (例如: 2025-03)"
                },
                "output_file": {
                    "type": "string",
                    "description": "输出文件路径（可选，相对路径写入输出目录，默认 日报详情.md）"
                },
                "login_timeout": {
                    "type": "number",
                    "default": DEFAULT_LOGIN_TIMEOUT_SECS,
                    "description": "登录超时时间（秒），默认 360 秒（6 分钟）"
                }
            },
            "required": ["start_month", "end_month"]
        }),
    }
}

pub async fn execute(args: Value, ctx: ToolContext) -> McpResult<ToolCallResult> {
    let params: CollectParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    if params.start_month.trim().is_empty() {
        return Err(McpError::InvalidParams(
            "start_month 参数必须提供".to_string(),
        ));
    }
    if params.end_month.trim().is_empty() {
        return Err(McpError::InvalidParams("end_month 参数必须提供".to_string()));
    }

    tracing::info!(
        start = %params.start_month,
        end = %params.end_month,
        login_timeout = params.login_timeout,
        "auto_collect_reports called"
    );

    // Reject bad months before any login window opens.
    if let Err(e) = yst_report::month_range(&params.start_month, &params.end_month) {
        return Ok(ToolCallResult::error(format!("采集失败: {e}")));
    }

    let collector = match ctx
        .ensure_logged_in(Duration::from_secs(params.login_timeout))
        .await
    {
        Ok(collector) => collector,
        Err(e) => return Ok(ToolCallResult::error(format!("登录失败: {e}"))),
    };

    let output_file = ctx.resolve_output_file(params.output_file.as_deref());
    match collector
        .collect(&params.start_month, &params.end_month, &output_file)
        .await
    {
        Ok(summary) => {
            let text = format!(
                "✓ 采集完成！共采集 {} 个月份，{} 条日报，已保存到 {}",
                summary.months.len().saturating_sub(summary.failed_months.len()),
                summary.total_reports,
                summary.output_file.display()
            );
            let mut result = ToolCallResult::text(text);
            result.structured_content = serde_json::to_value(&summary).ok();
            Ok(result)
        }
        Err(e) => Ok(ToolCallResult::error(format!("采集失败: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::validator::validate_arguments;
    use crate::session::ReportSessionManager;
    use std::sync::Arc;

    fn ctx(dir: &tempfile::TempDir) -> ToolContext {
        Arc::new(ReportSessionManager::new(yst_report::ReportConfig::new(
            dir.path(),
        )))
    }

    #[tokio::test]
    async fn test_empty_month_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(json!({ "start_month": " ", "end_month": "2025-01" }), ctx(&dir))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidParameters");
    }

    #[tokio::test]
    async fn test_bad_range_fails_before_login() {
        let dir = tempfile::tempdir().unwrap();
        let result = execute(
            json!({ "start_month": "2025-03", "end_month": "2025-01" }),
            ctx(&dir),
        )
        .await
        .unwrap();
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_float_login_timeout_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let args = json!({
            "start_month": "2025-03",
            "end_month": "2025-01",
            "login_timeout": 360.0
        });
        let schema = definition().input_schema;
        assert!(validate_arguments(&schema, Some(args.clone())).is_ok());
        // Parsed fine; only the range is rejected.
        let result = execute(args, ctx(&dir)).await.unwrap();
        assert!(result.is_error());
    }
}
