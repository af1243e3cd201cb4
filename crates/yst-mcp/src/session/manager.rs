//! Shared state handed to every tool call: report settings, the cookie store,
//! and the lock that keeps browser logins one at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use yst_report::{BrowserLogin, Collector, CookieStore, ReportConfig, ReportError, ReportResult};

/// Context passed to tool handlers.
pub type ToolContext = Arc<ReportSessionManager>;

/// Obtains fresh cookies and saves them to the store. Returns how many
/// cookies were saved.
#[async_trait]
pub trait LoginFlow: Send + Sync + 'static {
    async fn run(
        &self,
        config: &ReportConfig,
        store: &CookieStore,
        timeout: Duration,
    ) -> ReportResult<usize>;
}

/// Interactive login in a visible Chrome window.
pub struct BrowserLoginFlow;

#[async_trait]
impl LoginFlow for BrowserLoginFlow {
    async fn run(
        &self,
        config: &ReportConfig,
        store: &CookieStore,
        timeout: Duration,
    ) -> ReportResult<usize> {
        BrowserLogin::new(config.clone(), store.clone())
            .run(timeout)
            .await
    }
}

/// Owns everything tools need to log in and collect reports.
pub struct ReportSessionManager {
    config: ReportConfig,
    store: CookieStore,
    login_flow: Arc<dyn LoginFlow>,
    login_lock: Mutex<()>,
}

impl std::fmt::Debug for ReportSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSessionManager")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ReportSessionManager {
    pub fn new(config: ReportConfig) -> Self {
        let store = CookieStore::new(config.cookie_file(), config.browser_profile_dir());
        tracing::info!(
            data_dir = %config.data_dir.display(),
            base_url = %config.base_url,
            "Report session ready"
        );
        Self {
            config,
            store,
            login_flow: Arc::new(BrowserLoginFlow),
            login_lock: Mutex::new(()),
        }
    }

    /// Replace the browser login, e.g. with a scripted one.
    pub fn with_login_flow(mut self, flow: impl LoginFlow) -> Self {
        self.login_flow = Arc::new(flow);
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn cookie_store(&self) -> &CookieStore {
        &self.store
    }

    pub fn resolve_output_file(&self, name: Option<&str>) -> PathBuf {
        self.config.resolve_output_file(name)
    }

    /// Run the interactive browser login. Concurrent callers wait for the
    /// login in progress instead of opening a second browser.
    pub async fn login(&self, timeout: Duration) -> ReportResult<usize> {
        let _guard = self.login_lock.lock().await;
        self.run_login(timeout).await
    }

    async fn run_login(&self, timeout: Duration) -> ReportResult<usize> {
        tracing::info!("Starting browser login");
        self.login_flow.run(&self.config, &self.store, timeout).await
    }

    /// A collector built from the saved cookies, if they are still accepted
    /// by the site.
    pub async fn logged_in_collector(&self) -> ReportResult<Option<Collector>> {
        if !self.store.has_cookies() {
            tracing::info!("No saved cookies");
            return Ok(None);
        }

        let cookies = match self.store.load() {
            Ok(cookies) if !cookies.is_empty() => cookies,
            Ok(_) => return Ok(None),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cookie file: {e}");
                return Ok(None);
            }
        };

        let collector = Collector::new(&self.config, &cookies)?;
        if collector.check_login_status().await {
            Ok(Some(collector))
        } else {
            tracing::info!("Saved cookies are no longer valid");
            Ok(None)
        }
    }

    /// Reuse the saved login, or log in through the browser and retry once.
    pub async fn ensure_logged_in(&self, login_timeout: Duration) -> ReportResult<Collector> {
        if let Some(collector) = self.logged_in_collector().await? {
            return Ok(collector);
        }

        let _guard = self.login_lock.lock().await;
        // Whoever held the lock may have just logged in.
        if let Some(collector) = self.logged_in_collector().await? {
            tracing::debug!("Login finished by a concurrent call");
            return Ok(collector);
        }
        self.run_login(login_timeout).await?;
        self.logged_in_collector()
            .await?
            .ok_or(ReportError::NotLoggedIn)
    }

    /// Delete saved cookies and the browser profile.
    pub fn clear_cookies(&self) -> ReportResult<()> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use yst_report::Cookie;

    fn manager(dir: &tempfile::TempDir) -> ReportSessionManager {
        let mut config = ReportConfig::new(dir.path().join("data"));
        config.base_url = "http://127.0.0.1:9".to_string();
        ReportSessionManager::new(config)
    }

    fn session_cookie() -> Cookie {
        Cookie {
            name: "_identity".to_string(),
            value: "token".to_string(),
            domain: "127.0.0.1".to_string(),
            path: "/".to_string(),
        }
    }

    /// Stands in for the browser: counts runs and saves a session cookie
    /// after a short delay.
    struct ScriptedLogin {
        runs: Arc<AtomicUsize>,
        saves_cookie: bool,
    }

    #[async_trait]
    impl LoginFlow for ScriptedLogin {
        async fn run(
            &self,
            _config: &ReportConfig,
            store: &CookieStore,
            _timeout: Duration,
        ) -> ReportResult<usize> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            if !self.saves_cookie {
                return Ok(0);
            }
            store.save(&[session_cookie()])?;
            Ok(1)
        }
    }

    /// A KPI site that serves the report list to anyone.
    async fn open_site() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/report/report-daily/my-list"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<ul id="report_list"></ul>"#),
            )
            .mount(&server)
            .await;
        server
    }

    fn scripted_manager(
        dir: &tempfile::TempDir,
        site: &MockServer,
        saves_cookie: bool,
    ) -> (ReportSessionManager, Arc<AtomicUsize>) {
        let mut config = ReportConfig::new(dir.path().join("data"));
        config.base_url = site.uri();
        let runs = Arc::new(AtomicUsize::new(0));
        let session = ReportSessionManager::new(config).with_login_flow(ScriptedLogin {
            runs: Arc::clone(&runs),
            saves_cookie,
        });
        (session, runs)
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let site = open_site().await;
        let dir = tempfile::tempdir().unwrap();
        let (session, runs) = scripted_manager(&dir, &site, true);

        let timeout = Duration::from_secs(5);
        let (first, second) = tokio::join!(
            session.ensure_logged_in(timeout),
            session.ensure_logged_in(timeout)
        );

        assert!(first.is_ok(), "{:?}", first.err());
        assert!(second.is_ok(), "{:?}", second.err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_cookies_skip_login() {
        let site = open_site().await;
        let dir = tempfile::tempdir().unwrap();
        let (session, runs) = scripted_manager(&dir, &site, true);
        session.cookie_store().save(&[session_cookie()]).unwrap();

        session
            .ensure_logged_in(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_without_cookies_is_not_logged_in() {
        let site = open_site().await;
        let dir = tempfile::tempdir().unwrap();
        let (session, runs) = scripted_manager(&dir, &site, false);

        let err = session
            .ensure_logged_in(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NotLoggedIn), "{err}");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_cookies_means_no_collector() {
        let dir = tempfile::tempdir().unwrap();
        let session = manager(&dir);
        assert!(session.logged_in_collector().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_site_means_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let session = manager(&dir);
        session
            .cookie_store()
            .save(&[Cookie {
                name: "_identity".to_string(),
                value: "v".to_string(),
                domain: "127.0.0.1".to_string(),
                path: "/".to_string(),
            }])
            .unwrap();
        assert!(session.logged_in_collector().await.unwrap().is_none());

        session.clear_cookies().unwrap();
        assert!(!session.cookie_store().has_cookies());
    }
}
