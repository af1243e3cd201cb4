//! HTTP collector for the monthly daily-report lists.
//!
//! Authenticates with the cookies saved by the login flow, fetches the report
//! list page for each month in a range, and writes the result as Markdown.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use scraper::{Html, Selector};

use crate::config::{ReportConfig, USER_AGENT};
use crate::cookie::cookie_header;
use crate::markdown::{render_markdown, write_markdown};
use crate::month::month_range;
use crate::types::{CollectSummary, Cookie, Report, ReportError, ReportResult};

/// Fetches report lists from the KPI site.
#[derive(Clone, Debug)]
pub struct Collector {
    client: reqwest::Client,
    list_url: String,
    cookie_header: Option<HeaderValue>,
}

impl Collector {
    /// Build a collector that sends the given cookies with every request.
    pub fn new(config: &ReportConfig, cookies: &[Cookie]) -> ReportResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh-TW;q=0.9,zh;q=0.8,en;q=0.7"),
        );

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        let cookie_header = if cookies.is_empty() {
            None
        } else {
            Some(
                HeaderValue::from_str(&cookie_header(cookies))
                    .map_err(|e| ReportError::InvalidInput(format!("Invalid cookie value: {e}")))?,
            )
        };

        Ok(Self {
            client,
            list_url: config.report_list_url(),
            cookie_header,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.cookie_header {
            Some(value) => request.header(COOKIE, value.clone()),
            None => request,
        }
    }

    /// Whether the saved cookies still reach the report list without being
    /// redirected to a login page.
    pub async fn check_login_status(&self) -> bool {
        match self.get(&self.list_url).send().await {
            Ok(resp) => {
                resp.status().is_success() && !resp.url().as_str().contains("login")
            }
            Err(e) => {
                tracing::debug!("Login check failed: {e}");
                false
            }
        }
    }

    /// Fetch the report list of one `YYYY-MM` month.
    pub async fn fetch_month(&self, month: &str) -> ReportResult<Vec<Report>> {
        let url = format!("{}?month={month}", self.list_url);
        let resp = self.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ReportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = resp.text().await?;
        parse_report_list(&body)
    }

    /// Collect every month from `start` to `end` and write Markdown to
    /// `output_file`. Months that fail to fetch are logged and skipped.
    pub async fn collect(
        &self,
        start: &str,
        end: &str,
        output_file: &Path,
    ) -> ReportResult<CollectSummary> {
        let months = month_range(start, end)?;

        if !self.check_login_status().await {
            return Err(ReportError::NotLoggedIn);
        }

        let mut collected = BTreeMap::new();
        let mut failed_months = Vec::new();
        for month in &months {
            tracing::info!("Collecting reports for {month}");
            match self.fetch_month(month).await {
                Ok(reports) => {
                    tracing::info!("  {} reports in {month}", reports.len());
                    collected.insert(month.clone(), reports);
                }
                Err(e) => {
                    tracing::warn!("Failed to collect {month}: {e}");
                    failed_months.push(month.clone());
                }
            }
        }

        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let markdown = render_markdown(&collected, &generated_at);
        write_markdown(output_file, &markdown)?;

        let total_reports = collected.values().map(Vec::len).sum();
        Ok(CollectSummary {
            months,
            failed_months,
            total_reports,
            output_file: output_file.to_path_buf(),
        })
    }
}

/// Extract the entries of `#report_list` from a report list page.
pub fn parse_report_list(html: &str) -> ReportResult<Vec<Report>> {
    let document = Html::parse_document(html);
    let item_sel = selector("#report_list li")?;
    let link_sel = selector("a")?;

    let reports = document
        .select(&item_sel)
        .filter_map(|item| {
            let text = item.text().collect::<String>().trim().to_string();
            if text.is_empty() {
                return None;
            }
            let link = item
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);
            Some(Report { text, link })
        })
        .collect();

    Ok(reports)
}

fn selector(css: &str) -> ReportResult<Selector> {
    Selector::parse(css).map_err(|e| ReportError::InvalidInput(format!("Invalid selector {css}: {e}")))
}
