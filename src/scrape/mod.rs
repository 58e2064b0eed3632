// src/scrape/mod.rs
//! Per-site scrapers behind one trait, plus the steps they share.
//!
//! Each scraper walks its search combinations, checks `ScrapeContext::is_expired` before
//! every navigation, and returns what it has when the budget runs out. A navigation error
//! skips one combination. A persistent challenge or a failed login check ends the source.

pub mod challenge;
pub mod itviec;
pub mod linkedin;
pub mod topcv;
pub mod topdev;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::evasion::StealthProfile;
use crate::metrics::SCRAPE_ERRORS;
use crate::posting::{fold_text, Posting};
use crate::screenshot::ScreenshotDebugger;
use crate::surface::cookies::load_source_cookies;
use crate::surface::{Surface, SurfaceError};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("{source_name}: anti-bot challenge still present at {url}")]
    Challenge {
        source_name: &'static str,
        url: String,
        screenshot: Option<PathBuf>,
    },
    #[error("{source_name}: session check failed: {reason}")]
    Session {
        source_name: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Everything a scraper needs for one run.
pub struct ScrapeContext {
    pub surface: Arc<dyn Surface>,
    pub stealth: StealthProfile,
    pub screenshots: ScreenshotDebugger,
    pub navigation_timeout: Duration,
    pub deadline: Instant,
}

impl ScrapeContext {
    pub fn new(surface: Arc<dyn Surface>, budget: Duration) -> Self {
        Self {
            surface,
            stealth: StealthProfile::default(),
            screenshots: ScreenshotDebugger::new("screenshots"),
            navigation_timeout: Duration::from_secs(30),
            deadline: Instant::now() + budget,
        }
    }

    pub fn with_stealth(mut self, stealth: StealthProfile) -> Self {
        self.stealth = stealth;
        self
    }

    pub fn with_screenshots(mut self, screenshots: ScreenshotDebugger) -> Self {
        self.screenshots = screenshots;
        self
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[async_trait]
pub trait SourceScraper: Send + Sync {
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        keywords: &[String],
        locations: &[String],
    ) -> Result<Vec<Posting>, ScrapeError>;

    fn name(&self) -> &'static str;
}

/// Startup registry of the supported sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    TopCv,
    ItViec,
    LinkedIn,
    TopDev,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::TopCv,
        SourceKind::ItViec,
        SourceKind::LinkedIn,
        SourceKind::TopDev,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::TopCv => "topcv",
            SourceKind::ItViec => "itviec",
            SourceKind::LinkedIn => "linkedin",
            SourceKind::TopDev => "topdev",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
    }

    pub fn build(&self, cfg: &ScraperConfig) -> Box<dyn SourceScraper> {
        let filter = CardFilter::new(&cfg.exclude_keywords);
        match self {
            SourceKind::TopCv => Box::new(topcv::TopCvScraper::new(filter)),
            SourceKind::ItViec => Box::new(itviec::ItViecScraper::new(filter)),
            SourceKind::LinkedIn => {
                let now = Utc::now().timestamp() as f64;
                let authenticated =
                    !load_source_cookies(&cfg.cookies_dir, self.as_str(), now).is_empty();
                Box::new(linkedin::LinkedInScraper::new(filter, authenticated))
            }
            SourceKind::TopDev => Box::new(topdev::TopDevScraper::new(filter)),
        }
    }
}

/// Result of a best-effort UI step. Callers log it and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    Applied,
    Skipped(String),
    Failed(String),
}

impl Advisory {
    pub fn log(&self, source: &str, step: &str) {
        match self {
            Advisory::Applied => debug!(target: "scrape", source, step, "applied"),
            Advisory::Skipped(why) => debug!(target: "scrape", source, step, reason = %why, "skipped"),
            Advisory::Failed(why) => warn!(target: "scrape", source, step, reason = %why, "failed, continuing"),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Advisory::Applied)
    }
}

/// Navigate to a listing and clear the challenge gate.
///
/// `Ok(true)`: page ready. `Ok(false)`: navigation failed, skip this combination.
/// `Err`: the challenge persisted; the source is done.
pub async fn open_listing(
    ctx: &ScrapeContext,
    source: &'static str,
    url: &str,
) -> Result<bool, ScrapeError> {
    debug!(target: "scrape", source, url, "navigating");
    if let Err(e) = ctx.surface.goto(url, ctx.navigation_timeout).await {
        // Challenge pages usually answer 403/503; those still go through the gate.
        let blocked = matches!(e, SurfaceError::Status { .. })
            && crate::evasion::page_is_challenged(ctx.surface.as_ref()).await;
        if !blocked {
            warn!(target: "scrape", source, url, error = %e, "navigation failed, skipping");
            counter!(SCRAPE_ERRORS, "source" => source).increment(1);
            return Ok(false);
        }
    }
    challenge::pass_challenge(ctx, source).await?;
    Ok(true)
}

/// Drops cards that fail the keyword sanity check or hit a configured exclude keyword.
#[derive(Debug, Clone, Default)]
pub struct CardFilter {
    exclude: Vec<String>,
}

impl CardFilter {
    pub fn new(exclude_keywords: &[String]) -> Self {
        Self {
            exclude: exclude_keywords
                .iter()
                .map(|k| fold_text(k.trim()))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn is_excluded(&self, title: &str, company: &str) -> bool {
        let hay = fold_text(&format!("{title} {company}"));
        self.exclude.iter().any(|k| hay.contains(k.as_str()))
    }

    pub fn keeps(&self, keyword: &str, p: &Posting) -> bool {
        if !mentions_keyword(keyword, &p.title, &p.description) {
            debug!(target: "scrape", title = %p.title, keyword, "keyword not in card, dropped");
            return false;
        }
        if self.is_excluded(&p.title, &p.company) {
            debug!(target: "scrape", title = %p.title, "exclude keyword hit, dropped");
            return false;
        }
        true
    }
}

/// Keyword phrase in title or description, or every keyword term in title + description.
pub fn mentions_keyword(keyword: &str, title: &str, description: &str) -> bool {
    let kw = fold_text(keyword.trim());
    if kw.is_empty() {
        return true;
    }
    let t = fold_text(title);
    let d = fold_text(description);
    if t.contains(&kw) || d.contains(&kw) {
        return true;
    }
    let both = format!("{t} {d}");
    kw.split_whitespace().all(|term| both.contains(term))
}

/// Keep the first posting per URL, in order.
pub fn dedup_by_url(postings: Vec<Posting>) -> Vec<Posting> {
    let mut seen = HashSet::new();
    postings
        .into_iter()
        .filter(|p| seen.insert(p.url.clone()))
        .collect()
}
