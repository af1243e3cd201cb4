//! Report collection settings and default path resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default KPI site.
pub const DEFAULT_BASE_URL: &str = "https://kpi.drojian.dev";

/// Path of the daily report list, relative to the base URL.
pub const REPORT_LIST_PATH: &str = "/report/report-daily/my-list";

/// Path of the login page, relative to the base URL.
pub const LOGIN_PATH: &str = "/site/login";

/// User agent sent with every request and used by the login browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/140.0.0.0 Safari/537.36";

/// Default output file name.
pub const DEFAULT_OUTPUT_FILE: &str = "日报详情.md";

const APP_DIR: &str = ".yst_mcp";

/// Settings shared by the collector, cookie store, and login flow.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub chrome_path: Option<PathBuf>,
    pub http_timeout: Duration,
    pub login_poll_interval: Duration,
}

impl ReportConfig {
    /// Settings rooted at the given data directory with all other defaults.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: data_dir.into(),
            output_dir: None,
            chrome_path: None,
            http_timeout: Duration::from_secs(30),
            login_poll_interval: Duration::from_secs(3),
        }
    }

    pub fn report_list_url(&self) -> String {
        format!("{}{REPORT_LIST_PATH}", self.base_url.trim_end_matches('/'))
    }

    pub fn login_url(&self) -> String {
        format!("{}{LOGIN_PATH}", self.base_url.trim_end_matches('/'))
    }

    pub fn cookie_file(&self) -> PathBuf {
        self.data_dir.join("cookies.json")
    }

    pub fn browser_profile_dir(&self) -> PathBuf {
        self.data_dir.join("browser_profile")
    }

    /// Resolve where a collection run writes its Markdown.
    ///
    /// Absolute paths are used as given; relative ones are joined onto the
    /// output directory.
    pub fn resolve_output_file(&self, requested: Option<&str>) -> PathBuf {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            Some(path) if Path::new(path).is_absolute() => PathBuf::from(path),
            Some(path) => self.output_dir().join(path),
            None => self.output_dir().join(DEFAULT_OUTPUT_FILE),
        }
    }

    /// Explicit output directory, else a writable working directory, else
    /// `~/.yst_mcp/output`.
    pub fn output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }

        if let Ok(cwd) = std::env::current_dir() {
            if is_writable(&cwd) {
                tracing::debug!("Using working directory for output: {}", cwd.display());
                return cwd;
            }
        }

        let dir = home_dir().join(APP_DIR).join("output");
        tracing::debug!("Using home directory for output: {}", dir.display());
        dir
    }
}

/// Resolve the data directory: explicit, then `YST_MCP_DATA_DIR`, then
/// `~/.yst_mcp/data`.
pub fn resolve_data_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var("YST_MCP_DATA_DIR") {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }

    home_dir().join(APP_DIR).join("data")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(".yst_write_probe");
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_ignore_trailing_slash() {
        let mut config = ReportConfig::new("/tmp/data");
        config.base_url = "http://127.0.0.1:9000/".to_string();
        assert_eq!(
            config.report_list_url(),
            "http://127.0.0.1:9000/report/report-daily/my-list"
        );
        assert_eq!(config.login_url(), "http://127.0.0.1:9000/site/login");
    }

    #[test]
    fn test_resolve_output_file() {
        let mut config = ReportConfig::new("/tmp/data");
        config.output_dir = Some(PathBuf::from("/srv/out"));

        assert_eq!(
            config.resolve_output_file(None),
            PathBuf::from("/srv/out").join(DEFAULT_OUTPUT_FILE)
        );
        assert_eq!(
            config.resolve_output_file(Some("  ")),
            PathBuf::from("/srv/out").join(DEFAULT_OUTPUT_FILE)
        );
        assert_eq!(
            config.resolve_output_file(Some("march.md")),
            PathBuf::from("/srv/out/march.md")
        );
        assert_eq!(
            config.resolve_output_file(Some("/abs/report.md")),
            PathBuf::from("/abs/report.md")
        );
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        assert_eq!(resolve_data_dir(Some("/x/y")), PathBuf::from("/x/y"));
    }
}
