//! Collector integration tests against a mock KPI site.

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yst_report::{Collector, Cookie, ReportConfig, ReportError};

const LIST_PATH: &str = "/report/report-daily/my-list";

fn list_page(items: &[&str]) -> String {
    let lis: String = items
        .iter()
        .enumerate()
        .map(|(i, text)| format!(r#"<li><a href="/report/view?id={i}">{text}</a></li>"#))
        .collect();
    format!(r#"<html><body><ul id="report_list">{lis}</ul></body></html>"#)
}

fn session_cookie() -> Vec<Cookie> {
    vec![Cookie {
        name: "_identity".to_string(),
        value: "token".to_string(),
        domain: "127.0.0.1".to_string(),
        path: "/".to_string(),
    }]
}

fn config_for(server: &MockServer, dir: &tempfile::TempDir) -> ReportConfig {
    let mut config = ReportConfig::new(dir.path().join("data"));
    config.base_url = server.uri();
    config.output_dir = Some(dir.path().join("out"));
    config
}

async fn mount_month(server: &MockServer, month: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("month", month))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .with_priority(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_collect_writes_markdown() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(header("cookie", "_identity=token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&[])))
        .mount(&server)
        .await;
    mount_month(&server, "2024-12", 200, list_page(&["周一 发布", "周二 复盘"])).await;
    mount_month(&server, "2025-01", 200, list_page(&["周三 排期"])).await;

    let collector = Collector::new(&config, &session_cookie()).unwrap();
    let output = config.resolve_output_file(Some("reports.md"));
    let summary = collector.collect("2024-12", "2025-01", &output).await.unwrap();

    assert_eq!(summary.months, vec!["2024-12", "2025-01"]);
    assert!(summary.failed_months.is_empty());
    assert_eq!(summary.total_reports, 3);
    assert_eq!(summary.output_file, dir.path().join("out/reports.md"));

    let md = std::fs::read_to_string(&output).unwrap();
    assert!(md.contains("## 2024-12 月份日报 (2 条)"));
    assert!(md.contains("### 2. 周二 复盘"));
    assert!(md.contains("## 2025-01 月份日报 (1 条)"));
}

#[tokio::test]
async fn test_failed_month_is_skipped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&[])))
        .mount(&server)
        .await;
    mount_month(&server, "2025-01", 200, list_page(&["ok"])).await;
    mount_month(&server, "2025-02", 500, String::new()).await;

    let collector = Collector::new(&config, &session_cookie()).unwrap();
    let output = dir.path().join("out/skip.md");
    let summary = collector.collect("2025-01", "2025-02", &output).await.unwrap();

    assert_eq!(summary.failed_months, vec!["2025-02"]);
    assert_eq!(summary.total_reports, 1);
    let md = std::fs::read_to_string(&output).unwrap();
    assert!(!md.contains("2025-02"));
}

#[tokio::test]
async fn test_redirect_to_login_means_logged_out() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/site/login", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/site/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let collector = Collector::new(&config, &[]).unwrap();
    assert!(!collector.check_login_status().await);

    let err = collector
        .collect("2025-01", "2025-01", &dir.path().join("never.md"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::NotLoggedIn));
    assert!(!dir.path().join("never.md").exists());
}

#[tokio::test]
async fn test_bad_range_fails_before_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);

    let collector = Collector::new(&config, &session_cookie()).unwrap();
    let err = collector
        .collect("2025-13", "2025-01", &dir.path().join("x.md"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidMonth(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
