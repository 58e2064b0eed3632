// tests/common/mod.rs
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use job_scout::evasion::StealthProfile;
use job_scout::notify::Notifier;
use job_scout::posting::Posting;
use job_scout::scrape::{ScrapeContext, ScrapeError, SourceScraper};
use job_scout::screenshot::ScreenshotDebugger;
use job_scout::surface::fixture::FixtureSurface;
use job_scout::surface::SurfaceError;

/// Keeps every message; URLs listed in `fail_urls` make `send_posting` fail.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Arc<Mutex<Vec<Posting>>>,
    pub statuses: Arc<Mutex<Vec<String>>>,
    pub fail_urls: Vec<String>,
}

impl RecordingNotifier {
    pub fn failing_on(urls: &[&str]) -> Self {
        Self {
            fail_urls: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn sent_urls(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|p| p.url.clone()).collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_posting(&self, posting: &Posting) -> Result<()> {
        if self.fail_urls.contains(&posting.url) {
            return Err(anyhow!("chat unavailable"));
        }
        self.sent.lock().unwrap().push(posting.clone());
        Ok(())
    }

    async fn send_status(&self, text: &str) -> Result<()> {
        self.statuses.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub enum StubBehaviour {
    Return(Vec<Posting>),
    Challenge,
    /// Sleeps past any reasonable test budget.
    Hang,
}

/// Scraper returning canned output without touching the surface.
pub struct StubScraper {
    pub name: &'static str,
    pub behaviour: StubBehaviour,
}

impl StubScraper {
    pub fn returning(name: &'static str, postings: Vec<Posting>) -> Box<dyn SourceScraper> {
        Box::new(Self {
            name,
            behaviour: StubBehaviour::Return(postings),
        })
    }

    pub fn challenged(name: &'static str) -> Box<dyn SourceScraper> {
        Box::new(Self {
            name,
            behaviour: StubBehaviour::Challenge,
        })
    }

    pub fn hanging(name: &'static str) -> Box<dyn SourceScraper> {
        Box::new(Self {
            name,
            behaviour: StubBehaviour::Hang,
        })
    }
}

#[async_trait]
impl SourceScraper for StubScraper {
    async fn scrape(
        &self,
        _ctx: &ScrapeContext,
        _keywords: &[String],
        _locations: &[String],
    ) -> Result<Vec<Posting>, ScrapeError> {
        match &self.behaviour {
            StubBehaviour::Return(p) => Ok(p.clone()),
            StubBehaviour::Challenge => Err(ScrapeError::Challenge {
                source_name: self.name,
                url: "https://blocked.example/".into(),
                screenshot: None,
            }),
            StubBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ScrapeError::Surface(SurfaceError::NoPage))
            }
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

pub fn posting(title: &str, url: &str, location: &str, source: &str) -> Posting {
    Posting {
        title: title.into(),
        company: "Acme".into(),
        url: url.into(),
        location: location.into(),
        salary: "Negotiable".into(),
        tech_stack: "golang".into(),
        description: String::new(),
        source: source.into(),
        posted_date: "Recent".into(),
        match_score: None,
    }
}

/// Instant delays, screenshots under `shots`.
pub fn fixture_ctx(surface: FixtureSurface, shots: &Path) -> ScrapeContext {
    ScrapeContext::new(Arc::new(surface), Duration::from_secs(60))
        .with_stealth(StealthProfile::instant())
        .with_screenshots(ScreenshotDebugger::new(shots))
        .with_navigation_timeout(Duration::from_secs(5))
}

/// Same as `fixture_ctx`, but the time budget is already spent.
pub fn expired_ctx(surface: FixtureSurface, shots: &Path) -> ScrapeContext {
    ScrapeContext::new(Arc::new(surface), Duration::ZERO)
        .with_stealth(StealthProfile::instant())
        .with_screenshots(ScreenshotDebugger::new(shots))
        .with_navigation_timeout(Duration::from_secs(5))
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
