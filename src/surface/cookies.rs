// src/surface/cookies.rs
//! Browser-exported cookie files (JSON array), one per source: `cookies-<source>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    /// Unix seconds; `-1` or absent means a session cookie.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

fn default_path() -> String {
    "/".into()
}

impl Cookie {
    pub fn is_expired(&self, now_secs: f64) -> bool {
        matches!(self.expires, Some(e) if e > 0.0 && e < now_secs)
    }

    /// Domain-suffix match; a leading dot is ignored.
    pub fn matches_host(&self, host: &str) -> bool {
        let d = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let h = host.to_ascii_lowercase();
        !d.is_empty() && (h == d || h.ends_with(&format!(".{d}")))
    }

    fn matches_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        self.matches_host(host) && url.path().starts_with(self.path.as_str())
    }
}

pub fn cookie_path(dir: &Path, source: &str) -> PathBuf {
    dir.join(format!("cookies-{}.json", source.to_ascii_lowercase()))
}

/// Parse a cookie file and drop expired entries.
pub fn load_cookie_file(path: &Path, now_secs: f64) -> Result<Vec<Cookie>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading cookie file {}", path.display()))?;
    let all: Vec<Cookie> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing cookie file {}", path.display()))?;
    let total = all.len();
    let live: Vec<Cookie> = all.into_iter().filter(|c| !c.is_expired(now_secs)).collect();
    debug!(path = %path.display(), live = live.len(), expired = total - live.len(), "cookies loaded");
    Ok(live)
}

/// Best-effort load for one source: a missing file is silent, an invalid one is logged.
pub fn load_source_cookies(dir: &Path, source: &str, now_secs: f64) -> Vec<Cookie> {
    let path = cookie_path(dir, source);
    if !path.exists() {
        return Vec::new();
    }
    match load_cookie_file(&path, now_secs) {
        Ok(c) => c,
        Err(e) => {
            warn!(source, error = %format!("{e:#}"), "ignoring cookie file");
            Vec::new()
        }
    }
}

/// `Cookie` header value for `url`, if any cookie applies.
pub fn cookie_header(cookies: &[Cookie], url: &Url, now_secs: f64) -> Option<String> {
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|c| !c.is_expired(now_secs) && c.matches_url(url))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
