//! Markdown export of collected reports and summary preparation.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::types::{Report, ReportResult, SummaryRequest};

const TITLE: &str = "# YST 日报整理";
const EMPTY_MONTH: &str = "*暂无数据*";
const CSV_SUFFIX: &str = "月汇总总结.csv";

/// Render reports grouped by month, months in ascending order.
pub fn render_markdown(reports: &BTreeMap<String, Vec<Report>>, generated_at: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}\n");
    let _ = writeln!(out, "生成时间：{generated_at}\n");

    for (month, entries) in reports {
        let _ = writeln!(out, "## {month} 月份日报 ({} 条)\n", entries.len());

        if entries.is_empty() {
            let _ = writeln!(out, "{EMPTY_MONTH}\n");
            continue;
        }

        for (i, report) in entries.iter().enumerate() {
            let _ = writeln!(out, "### {}. {}\n", i + 1, report.text);
            if let Some(link) = report.link.as_deref().filter(|l| !l.is_empty()) {
                let _ = writeln!(out, "链接：{link}\n");
            }
            let _ = writeln!(out, "---\n");
        }
    }

    out
}

/// Write rendered Markdown, creating parent directories.
pub fn write_markdown(path: &Path, content: &str) -> ReportResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// The CSV file a summary of `md_path` should be saved as.
///
/// `3月日报.md` becomes `3月汇总总结.csv` in the same directory; names
/// without `月` keep their whole stem as the prefix.
pub fn summary_csv_path(md_path: &Path) -> PathBuf {
    let stem = md_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = stem.split('月').next().unwrap_or_default();
    let dir = md_path.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{prefix}{CSV_SUFFIX}"))
}

/// Read a report Markdown file for summarisation.
pub fn read_for_summary(md_path: &Path) -> ReportResult<SummaryRequest> {
    let content = std::fs::read_to_string(md_path)?;
    Ok(SummaryRequest {
        content,
        csv_path: summary_csv_path(md_path),
    })
}
