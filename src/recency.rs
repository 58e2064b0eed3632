// src/recency.rs
//! Posted-date parsing for the recency gate.
//!
//! Sources print dates in whatever shape they like ("2026-01-27", "27/01/2026",
//! "Posted in 2025", "Recent"). Anything we cannot place on a calendar counts as
//! recent.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

fn default_max_age_days() -> i64 {
    60
}
fn default_max_future_days() -> i64 {
    2
}

/// Accepted window around "now": `max_age_days` back, `max_future_days` forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RecencyWindow {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "default_max_future_days")]
    pub max_future_days: i64,
}

impl Default for RecencyWindow {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
            max_future_days: default_max_future_days(),
        }
    }
}

/// What the parser made of a posted-date string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostedDate {
    /// Empty or a sentinel such as "N/A" / "Recent".
    Sentinel,
    Day(NaiveDate),
    Year(i32),
    Unknown,
}

pub fn parse_posted_date(raw: &str) -> PostedDate {
    static RE_ISO: OnceCell<Regex> = OnceCell::new();
    static RE_YEAR: OnceCell<Regex> = OnceCell::new();
    let re_iso = RE_ISO.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("iso regex"));
    let re_year = RE_YEAR.get_or_init(|| Regex::new(r"\b(20[0-9]{2})\b").expect("year regex"));

    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("n/a") || s.eq_ignore_ascii_case("recent") {
        return PostedDate::Sentinel;
    }

    // ASCII digits only, so the 10-byte prefix is always a char boundary.
    if re_iso.is_match(s) {
        if let Some(Ok(d)) = s.get(..10).map(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d")) {
            return PostedDate::Day(d);
        }
    }

    // D/M/Y, day first
    let parts: Vec<&str> = s.split('/').map(str::trim).collect();
    if parts.len() >= 3 {
        let num = |p: &str| -> Option<u32> {
            let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        };
        if let (Some(day), Some(month), Some(year)) = (num(parts[0]), num(parts[1]), num(parts[2])) {
            if let Some(d) = NaiveDate::from_ymd_opt(year as i32, month, day) {
                return PostedDate::Day(d);
            }
        }
    }

    if let Some(caps) = re_year.captures(s) {
        if let Ok(y) = caps[1].parse::<i32>() {
            return PostedDate::Year(y);
        }
    }

    PostedDate::Unknown
}

/// Recency decision against an explicit clock.
pub fn is_recent_at(raw: &str, now: DateTime<Utc>, window: RecencyWindow) -> bool {
    match parse_posted_date(raw) {
        PostedDate::Sentinel | PostedDate::Unknown => true,
        PostedDate::Day(d) => {
            let age = now.date_naive().signed_duration_since(d);
            age <= Duration::days(window.max_age_days)
                && age >= -Duration::days(window.max_future_days)
        }
        PostedDate::Year(y) => y == now.year() || y == now.year() - 1,
    }
}
