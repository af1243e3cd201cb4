//! Configuration loading and resolution.

use std::path::PathBuf;
use std::time::Duration;

use yst_report::{resolve_data_dir, ReportConfig};

use crate::transport::DEFAULT_MAX_FRAME_BYTES;
use crate::types::{McpError, McpResult};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;
pub const DEFAULT_MAX_QUEUED: usize = 64;

/// Smallest frame limit accepted; below this even `initialize` would not fit.
const MIN_FRAME_BYTES: usize = 1024;

/// Server runtime settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Tool calls allowed to run at once.
    pub max_concurrency: usize,
    /// Accepted calls allowed to wait for a free slot. Further input is not
    /// read until one frees up.
    pub max_queued: usize,
    /// How long a signal or `shutdown` waits for in-flight calls.
    pub grace_period: Duration,
    pub max_frame_bytes: usize,
    /// Tools that must be registered for the server to start.
    pub required_tools: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_queued: DEFAULT_MAX_QUEUED,
            grace_period: Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            required_tools: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> McpResult<()> {
        if self.max_concurrency == 0 {
            return Err(McpError::StartupConfiguration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_frame_bytes < MIN_FRAME_BYTES {
            return Err(McpError::StartupConfiguration(format!(
                "max_frame_bytes must be at least {MIN_FRAME_BYTES}, got {}",
                self.max_frame_bytes
            )));
        }
        Ok(())
    }
}

/// Build the report settings from command-line values.
pub fn resolve_report_config(
    data_dir: Option<&str>,
    output_dir: Option<&str>,
    base_url: Option<&str>,
    chrome_path: Option<&str>,
) -> ReportConfig {
    let mut config = ReportConfig::new(resolve_data_dir(data_dir));
    if let Some(url) = base_url.filter(|u| !u.is_empty()) {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    config.output_dir = output_dir.map(PathBuf::from);
    config.chrome_path = chrome_path.map(PathBuf::from);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = ServerConfig {
            max_concurrency: 0,
            ..ServerConfig::default()
        };
        assert_eq!(
            config.validate().unwrap_err().kind(),
            "StartupConfigurationError"
        );
    }

    #[test]
    fn test_tiny_frame_limit_rejected() {
        let config = ServerConfig {
            max_frame_bytes: 16,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_report_config_overrides() {
        let config = resolve_report_config(
            Some("/tmp/yst-data"),
            Some("/tmp/yst-out"),
            Some("http://localhost:8080/"),
            None,
        );
        assert_eq!(config.data_dir, PathBuf::from("/tmp/yst-data"));
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/yst-out")));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.chrome_path, None);
    }
}
