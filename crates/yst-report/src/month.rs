//! `YYYY-MM` month parsing and inclusive range generation.

use chrono::{Datelike, Months, NaiveDate};

use crate::types::{ReportError, ReportResult};

/// Parse a `YYYY-MM` string into the first day of that month.
pub fn parse_month(month: &str) -> ReportResult<NaiveDate> {
    let trimmed = month.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return Err(ReportError::InvalidMonth(month.to_string()));
    }

    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .map_err(|_| ReportError::InvalidMonth(month.to_string()))
}

/// Every month from `start` to `end`, both inclusive, as `YYYY-MM`.
pub fn month_range(start: &str, end: &str) -> ReportResult<Vec<String>> {
    let first = parse_month(start)?;
    let last = parse_month(end)?;

    if first > last {
        return Err(ReportError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let mut months = Vec::new();
    let mut current = first;
    while current <= last {
        months.push(format_month(current));
        current = current
            .checked_add_months(Months::new(1))
            .ok_or_else(|| ReportError::InvalidMonth(end.to_string()))?;
    }

    Ok(months)
}

fn format_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}
