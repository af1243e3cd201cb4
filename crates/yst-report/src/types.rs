//! Core data types for report collection.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A browser cookie persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

/// One entry of a monthly daily-report list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Outcome of a collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectSummary {
    /// Every month in the requested range, including ones that failed to fetch.
    pub months: Vec<String>,
    /// Months whose fetch failed and were skipped.
    pub failed_months: Vec<String>,
    pub total_reports: usize,
    pub output_file: PathBuf,
}

/// Markdown content plus the CSV path a summary should be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub content: String,
    pub csv_path: PathBuf,
}

/// Errors that can occur in the report library.
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid month '{0}', expected YYYY-MM")]
    InvalidMonth(String),

    #[error("Invalid month range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    #[error("Not logged in or the session has expired; run browser_login first")]
    NotLoggedIn,

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Login timed out after {0} seconds")]
    LoginTimeout(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type ReportResult<T> = Result<T, ReportError>;
