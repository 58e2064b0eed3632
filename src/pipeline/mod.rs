// src/pipeline/mod.rs
//! One discovery run: scrape each source, rank, dedup against the seen cache, notify.
//!
//! Flow:
//!   sources (sequential, bounded by the context deadline)
//!     -> per-source rank (filter + score + stable sort)
//!     -> concat -> canonical URL -> within-run dedup -> seen-cache split
//!     -> snapshot of the unseen list
//!     -> throttled sends -> one batched `SeenCache::add`
//!
//! Only postings that reached a send attempt are marked seen.

pub mod results;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::dedup::SeenCache;
use crate::metrics::{
    ensure_metrics_described, NOTIFY_ERRORS, NOTIFY_SENT, PIPELINE_ADMITTED, PIPELINE_LAST_RUN_TS,
    PIPELINE_UNSEEN, SCRAPE_ERRORS, SCRAPE_POSTINGS,
};
use crate::notify::Notifier;
use crate::posting::{canonical_url, Posting};
use crate::relevance::RelevanceRules;
use crate::scrape::{ScrapeContext, ScrapeError, SourceScraper};

/// What a failing source does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceErrorPolicy {
    /// Log, count, go on with the next source.
    #[default]
    Continue,
    /// Stop the run with `PipelineError::SourceAborted`.
    Abort,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source {source_name} aborted the run: {error}")]
    SourceAborted {
        source_name: &'static str,
        #[source]
        error: ScrapeError,
    },
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub on_source_error: SourceErrorPolicy,
    pub send_delay: Duration,
    pub max_notifications: Option<usize>,
    pub results_dir: PathBuf,
    /// Scrape, rank and dedup, but send nothing and mark nothing seen.
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            on_source_error: SourceErrorPolicy::Continue,
            send_delay: Duration::from_secs(1),
            max_notifications: None,
            results_dir: PathBuf::from("logs"),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scraped: usize,
    pub admitted: usize,
    pub unseen: usize,
    pub notified: usize,
    pub failed_sends: usize,
    pub source_errors: usize,
    pub timed_out: bool,
    pub snapshot: Option<PathBuf>,
}

impl RunSummary {
    pub fn status_line(&self) -> String {
        let mut s = format!(
            "Job scout run finished: {} scraped, {} relevant, {} new, {} sent",
            self.scraped, self.admitted, self.unseen, self.notified
        );
        if self.failed_sends > 0 {
            s.push_str(&format!(", {} failed sends", self.failed_sends));
        }
        if self.source_errors > 0 {
            s.push_str(&format!(", {} source errors", self.source_errors));
        }
        if self.timed_out {
            s.push_str(", time budget exhausted");
        }
        s
    }
}

pub struct Pipeline {
    scrapers: Vec<Box<dyn SourceScraper>>,
    rules: RelevanceRules,
    cache: SeenCache,
    notifier: Box<dyn Notifier>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        scrapers: Vec<Box<dyn SourceScraper>>,
        rules: RelevanceRules,
        cache: SeenCache,
        notifier: Box<dyn Notifier>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            scrapers,
            rules,
            cache,
            notifier,
            options,
        }
    }

    pub fn cache(&self) -> &SeenCache {
        &self.cache
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Sources in order; returns admitted postings (per-source ranked, concatenated).
    async fn collect(
        &self,
        ctx: &ScrapeContext,
        keywords: &[String],
        locations: &[String],
        summary: &mut RunSummary,
    ) -> Result<Vec<Posting>, PipelineError> {
        let mut admitted = Vec::new();

        for scraper in &self.scrapers {
            let name = scraper.name();
            if ctx.is_expired() {
                warn!(target: "pipeline", source = name, "time budget spent before source started");
                summary.timed_out = true;
                break;
            }
            info!(target: "pipeline", source = name, "scraping");

            let outcome =
                tokio::time::timeout_at(ctx.deadline, scraper.scrape(ctx, keywords, locations)).await;
            match outcome {
                Err(_) => {
                    warn!(target: "pipeline", source = name, "time budget spent mid-source, in-flight work cancelled");
                    summary.timed_out = true;
                    break;
                }
                Ok(Ok(postings)) => {
                    let n = postings.len();
                    counter!(SCRAPE_POSTINGS, "source" => name).increment(n as u64);
                    summary.scraped += n;
                    let ranked = self.rules.rank(postings);
                    info!(target: "pipeline", source = name, scraped = n, admitted = ranked.len(), "source done");
                    summary.admitted += ranked.len();
                    admitted.extend(ranked);
                }
                Ok(Err(e)) => {
                    counter!(SCRAPE_ERRORS, "source" => name).increment(1);
                    summary.source_errors += 1;
                    match self.options.on_source_error {
                        SourceErrorPolicy::Abort => {
                            error!(target: "pipeline", source = name, error = %e, "source failed, aborting run");
                            return Err(PipelineError::SourceAborted {
                                source_name: name,
                                error: e,
                            });
                        }
                        SourceErrorPolicy::Continue => {
                            warn!(target: "pipeline", source = name, error = %e, "source failed, continuing");
                        }
                    }
                }
            }
        }

        if ctx.is_expired() {
            summary.timed_out = true;
        }
        counter!(PIPELINE_ADMITTED).increment(summary.admitted as u64);
        Ok(admitted)
    }

    /// Canonicalize, drop within-run duplicates (first wins), drop cache hits.
    fn unseen(&self, admitted: Vec<Posting>) -> Vec<Posting> {
        let mut in_run = HashSet::new();
        let mut out = Vec::new();
        for mut p in admitted {
            p.url = canonical_url(&p.url);
            if p.url.is_empty() || !in_run.insert(p.url.clone()) {
                continue;
            }
            if self.cache.is_seen(&p.url) {
                continue;
            }
            out.push(p);
        }
        out
    }

    pub async fn run(
        &self,
        ctx: &ScrapeContext,
        keywords: &[String],
        locations: &[String],
    ) -> Result<RunSummary, PipelineError> {
        ensure_metrics_described();
        let mut summary = RunSummary::default();

        let admitted = self.collect(ctx, keywords, locations, &mut summary).await?;
        let unseen = self.unseen(admitted);
        summary.unseen = unseen.len();
        counter!(PIPELINE_UNSEEN).increment(unseen.len() as u64);
        info!(target: "pipeline", admitted = summary.admitted, unseen = summary.unseen, seen_cache = self.cache.len(), "dedup done");

        match results::write_snapshot(&self.options.results_dir, &unseen, Utc::now().date_naive()) {
            Ok(p) => summary.snapshot = Some(p),
            Err(e) => warn!(target: "pipeline", error = %format!("{e:#}"), "result snapshot not written"),
        }

        if self.options.dry_run {
            for p in &unseen {
                info!(target: "pipeline", title = %p.title, company = %p.company, score = p.score(), url = %p.url, "dry run, not sending");
            }
            gauge!(PIPELINE_LAST_RUN_TS).set(Utc::now().timestamp() as f64);
            return Ok(summary);
        }

        let cap = self.options.max_notifications.unwrap_or(usize::MAX);
        let mut attempted: Vec<String> = Vec::new();
        for (i, p) in unseen.iter().enumerate() {
            if i >= cap {
                info!(target: "pipeline", left = unseen.len() - i, "notification cap reached, rest stays unseen");
                break;
            }
            if i > 0 && !self.options.send_delay.is_zero() {
                tokio::time::sleep(self.options.send_delay).await;
            }
            match self.notifier.send_posting(p).await {
                Ok(()) => {
                    counter!(NOTIFY_SENT).increment(1);
                    summary.notified += 1;
                }
                Err(e) => {
                    counter!(NOTIFY_ERRORS).increment(1);
                    summary.failed_sends += 1;
                    warn!(target: "pipeline", url = %p.url, error = %format!("{e:#}"), "send failed");
                }
            }
            attempted.push(p.url.clone());
        }
        self.cache.add(&attempted);

        if let Err(e) = self.notifier.send_status(&summary.status_line()).await {
            warn!(target: "pipeline", error = %format!("{e:#}"), "status message failed");
        }
        gauge!(PIPELINE_LAST_RUN_TS).set(Utc::now().timestamp() as f64);
        info!(target: "pipeline", notified = summary.notified, failed = summary.failed_sends, "run finished");
        Ok(summary)
    }
}
