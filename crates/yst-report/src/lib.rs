//! yst-report - core library for YST daily report login, collection, and export.

pub mod collector;
pub mod config;
pub mod cookie;
pub mod login;
pub mod markdown;
pub mod month;
pub mod types;

pub use collector::{parse_report_list, Collector};
pub use config::{resolve_data_dir, ReportConfig, DEFAULT_BASE_URL};
pub use cookie::CookieStore;
pub use login::{find_chromium, BrowserLogin};
pub use markdown::{read_for_summary, render_markdown, summary_csv_path};
pub use month::month_range;
pub use types::*;
