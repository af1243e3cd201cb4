//! Interactive login through a visible Chromium window.
//!
//! The user signs in by hand (the KPI site delegates to Google accounts); the
//! flow only watches the page location, and once the browser is back inside the
//! KPI site it copies the browser cookies into the [`CookieStore`].

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;

use crate::config::{ReportConfig, LOGIN_PATH, USER_AGENT};
use crate::cookie::CookieStore;
use crate::types::{Cookie, ReportError, ReportResult};

const GOOGLE_ACCOUNTS_HOST: &str = "accounts.google.com";

/// Find a Chrome/Chromium binary: explicit path, `YST_MCP_CHROME_PATH`, the
/// system `PATH`, then the standard macOS location.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.clone());
    }

    if let Ok(p) = std::env::var("YST_MCP_CHROME_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for candidate in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(candidate) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Drives the browser login and persists the resulting cookies.
pub struct BrowserLogin {
    config: ReportConfig,
    store: CookieStore,
}

impl BrowserLogin {
    pub fn new(config: ReportConfig, store: CookieStore) -> Self {
        Self { config, store }
    }

    /// Open the report list in a visible browser and wait up to `timeout` for
    /// the user to finish signing in. Returns the number of cookies saved.
    pub async fn run(&self, timeout: Duration) -> ReportResult<usize> {
        let profile_dir = self.store.profile_dir().to_path_buf();
        std::fs::create_dir_all(&profile_dir)?;

        let mut builder = BrowserConfig::builder()
            .with_head()
            .user_data_dir(&profile_dir)
            .window_size(1920, 1080)
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={USER_AGENT}"));
        if let Some(path) = find_chromium(self.config.chrome_path.as_ref()) {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(ReportError::Browser)?;

        tracing::info!("Launching browser for login (timeout {}s)", timeout.as_secs());
        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ReportError::Browser(format!("Failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let outcome = self.login_in(&browser, timeout).await;

        if let Err(e) = browser.close().await {
            tracing::debug!("Browser close failed: {e}");
        }
        let _ = browser.wait().await;
        handler_task.abort();

        outcome
    }

    async fn login_in(&self, browser: &Browser, timeout: Duration) -> ReportResult<usize> {
        let target = self.config.report_list_url();
        let page = browser
            .new_page(target.as_str())
            .await
            .map_err(|e| ReportError::Browser(format!("Failed to open {target}: {e}")))?;

        self.wait_for_login(&page, timeout).await?;

        let cookies: Vec<Cookie> = page
            .get_cookies()
            .await
            .map_err(|e| ReportError::Browser(format!("Failed to read cookies: {e}")))?
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
            })
            .collect();

        self.store.save(&cookies)?;
        Ok(cookies.len())
    }

    async fn wait_for_login(&self, page: &Page, timeout: Duration) -> ReportResult<()> {
        let site_host = reqwest::Url::parse(&self.config.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| {
                ReportError::InvalidInput(format!("Invalid base URL: {}", self.config.base_url))
            })?;
        let target = self.config.report_list_url();
        let started = Instant::now();

        while started.elapsed() < timeout {
            tokio::time::sleep(self.config.login_poll_interval).await;

            let current = match page.url().await {
                Ok(Some(url)) => url,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("Failed to read page URL: {e}");
                    continue;
                }
            };
            tracing::debug!(
                elapsed = started.elapsed().as_secs(),
                url = %current,
                "Waiting for login"
            );

            if !is_logged_in_url(&current, &site_host) {
                continue;
            }

            if !current.starts_with(&target) {
                if let Err(e) = page.goto(target.as_str()).await {
                    tracing::warn!("Navigation to report list failed: {e}");
                }
            }
            tracing::info!("Login detected after {}s", started.elapsed().as_secs());
            return Ok(());
        }

        Err(ReportError::LoginTimeout(timeout.as_secs()))
    }
}

/// The browser is inside the KPI site and no longer on a sign-in page.
pub fn is_logged_in_url(url: &str, site_host: &str) -> bool {
    url.contains(site_host) && !url.contains(GOOGLE_ACCOUNTS_HOST) && !url.contains(LOGIN_PATH)
}
