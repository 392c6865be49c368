use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("number regex"))
}

/// Date substituted whenever a document date cannot be recovered.
pub fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Collapses every whitespace run (including newlines) to a single space and trims.
pub fn clean_whitespace(s: &str) -> String {
    whitespace_re().replace_all(s, " ").trim().to_string()
}

/// Strips thousands separators and parses the first decimal-looking substring.
/// Returns 0.0 when no candidate number exists.
pub fn parse_amount(s: &str) -> f64 {
    let stripped = s.replace(',', "");
    number_re()
        .captures(&stripped)
        .and_then(|c| c[1].parse::<f64>().ok())
        .unwrap_or(0.0)
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses `raw` with a single chrono format, falling back to the sentinel date.
pub fn parse_date_or_sentinel(raw: &str, format: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw.trim(), format).unwrap_or_else(|_| sentinel_date())
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let year = if date.month() == 12 {
        date.year() + 1
    } else {
        date.year()
    };

    let month = if date.month() == 12 {
        1
    } else {
        date.month() + 1
    };

    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Month start `count` months after the month containing `date`.
pub fn add_months(date: NaiveDate, count: usize) -> NaiveDate {
    let mut current = month_start(date);
    for _ in 0..count {
        current = next_month_start(current);
    }
    current
}

/// Formats a month as the `YYYY-MM` key used in the monthly spending series.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
