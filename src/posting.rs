// src/posting.rs
//! The `Posting` record plus the text/URL normalization helpers every stage shares.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use url::Url;

/// Salary text used when a card does not show one.
pub const SALARY_FALLBACK: &str = "Negotiable";
/// Posted-date sentinel for listings that carry no date.
pub const POSTED_RECENT: &str = "Recent";

/// One job listing as extracted from a source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Posting {
    pub title: String,
    pub company: String,
    /// Canonical URL (no query/fragment); the dedup key.
    pub url: String,
    pub location: String,
    pub salary: String,
    pub tech_stack: String,
    pub description: String,
    pub source: String,
    /// Raw text, ISO date, or a sentinel such as "Recent".
    pub posted_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u8>,
}

impl Posting {
    /// Title + description, the text the admission decision looks at.
    pub fn admission_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Title + description + company, the text the score looks at.
    pub fn scoring_text(&self) -> String {
        format!("{} {} {}", self.title, self.description, self.company)
    }

    pub fn score(&self) -> u8 {
        self.match_score.unwrap_or(0)
    }
}

/// Strip query string and fragment so tracking parameters never split one listing into many keys.
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => {
            let cut = raw.find(['?', '#']).unwrap_or(raw.len());
            raw[..cut].to_string()
        }
    }
}

/// Resolve `href` against `base` (if relative) and canonicalize the result.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let joined = match Url::parse(href) {
        Ok(u) => u,
        Err(_) => Url::parse(base).ok()?.join(href).ok()?,
    };
    Some(canonical_url(joined.as_str()))
}

/// "Golang Developer" -> "golang-developer"
pub fn slugify(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Lowercase and remove combining diacritical marks ("Cần Thơ" -> "can tho").
pub fn fold_text(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect::<String>()
        .replace(['đ', 'Đ'], "d")
        .to_lowercase()
}

/// Decode entities, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    let decoded = html_escape::decode_html_entities(s);
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Keep at most `max` chars (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}
