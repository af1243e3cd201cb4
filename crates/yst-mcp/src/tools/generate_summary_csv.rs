//! Tool: generate_summary_csv - Hand a collected Markdown file back to the
//! model with instructions for building the monthly CSV summary.

use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::session::ToolContext;
use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

#[derive(Debug, Deserialize)]
struct SummaryParams {
    md_file_path: String,
}

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: "generate_summary_csv".to_string(),
        description: Some(
            "读取日报详情 MD 文件内容，返回给 AI 模型整理生成 CSV 汇总表格".to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "md_file_path": {
                    "type": "string",
                    "description": "日报详情 MD 文件的完整路径"
                }
            },
            "required": ["md_file_path"]
        }),
    }
}

pub async fn execute(args: Value, _ctx: ToolContext) -> McpResult<ToolCallResult> {
    let params: SummaryParams =
        serde_json::from_value(args).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    if params.md_file_path.trim().is_empty() {
        return Err(McpError::InvalidParams(
            "md_file_path 参数必须提供".to_string(),
        ));
    }

    tracing::info!(path = %params.md_file_path, "generate_summary_csv called");
    let md_path = Path::new(params.md_file_path.trim());
    let summary = match yst_report::read_for_summary(md_path) {
        Ok(summary) => summary,
        Err(e) => return Ok(ToolCallResult::error(format!("读取 MD 文件失败: {e}"))),
    };

    let prompt = format!(
        "📄 已读取日报详情文件: {md}\n\n\
         请根据以下日报内容，整理生成 CSV 格式的月度汇总表格，包含以下列：\n\
         - 序号\n\
         - 主要工作任务\n\
         - 权重\n\
         - 任务成果情况\n\n\
         生成的 CSV 文件应保存到: {csv}\n\n\
         日报内容如下：\n\
         ---\n\
         {content}\n\
         ---\n\n\
         请分析日报内容，提取主要工作任务，并生成符合格式的 CSV 文件。",
        md = md_path.display(),
        csv = summary.csv_path.display(),
        content = summary.content,
    );

    Ok(ToolCallResult::text(prompt).with_structured(json!({
        "md_file_path": md_path.display().to_string(),
        "csv_path": summary.csv_path.display().to_string(),
    })))
}
