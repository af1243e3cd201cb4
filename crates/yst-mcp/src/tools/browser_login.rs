//! Tool: browser_login - Open a browser window for the user to sign in.

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::session::ToolContext;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 360;

#[derive(Debug, Deserialize)]
struct LoginParams {
    #[serde(default = "default_timeout", deserialize_with = "timeout_secs")]
    timeout: u64,
}

pub(crate) fn default_timeout() -> u64 {
    DEFAULT_LOGIN_TIMEOUT_SECS
}

/// Accepts any JSON number of seconds. Fractions round up; values past
/// `u64::MAX` saturate.
pub(crate) fn timeout_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "timeout must be a non-negative number of seconds, got {secs}"
        )));
    }
    Ok(secs.ceil() as u64)
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "browser_login".to_string(),
        description: Some("启动浏览器进行登录".to_string()),
        input_schema: json!({
            "type": "object",
            "properties": {
                "timeout": {
                    "type": "number",
                    "default": DEFAULT_LOGIN_TIMEOUT_SECS,
                    "description": "登录超时时间（秒），默认 360 秒（6 分钟）"
                }
            }
        }),
    }
}

pub async fn execute(args: Value, ctx: ToolContext) -> McpResult<ToolCallResult> {
    let params: LoginParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    tracing::info!(timeout = params.timeout, "browser_login called");
    match ctx.login(Duration::from_secs(params.timeout)).await {
        Ok(count) => {
            tracing::info!("Saved {count} cookies");
            Ok(ToolCallResult::text(
                "✅ 登录成功！Cookie 已保存，现在可以使用 auto_collect_reports 采集数据了",
            ))
        }
        Err(e) => Ok(ToolCallResult::error(format!("登录失败: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: Value) -> Result<LoginParams, serde_json::Error> {
        serde_json::from_value(args)
    }

    #[test]
    fn test_timeout_accepts_any_number() {
        assert_eq!(parse(json!({})).unwrap().timeout, DEFAULT_LOGIN_TIMEOUT_SECS);
        assert_eq!(parse(json!({ "timeout": 360 })).unwrap().timeout, 360);
        assert_eq!(parse(json!({ "timeout": 360.0 })).unwrap().timeout, 360);
        assert_eq!(parse(json!({ "timeout": 1.5 })).unwrap().timeout, 2);
        assert_eq!(parse(json!({ "timeout": 1e30 })).unwrap().timeout, u64::MAX);
    }

    #[test]
    fn test_timeout_rejects_negative_and_text() {
        assert!(parse(json!({ "timeout": -1 })).is_err());
        assert!(parse(json!({ "timeout": "60" })).is_err());
    }

    #[test]
    fn test_float_timeout_passes_schema() {
        let schema = definition().input_schema;
        let args = json!({ "timeout": 360.0 });
        assert!(crate::protocol::validator::validate_arguments(&schema, Some(args)).is_ok());
    }
}
