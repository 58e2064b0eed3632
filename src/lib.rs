// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedup;
pub mod evasion;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod posting;
pub mod recency;
pub mod relevance;
pub mod screenshot;

// Browsing: the page capability and its implementations
pub mod surface;

// One scraper per job site, plus the challenge gate they share
pub mod scrape;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::dedup::SeenCache;
pub use crate::notify::{LogNotifier, Notifier};
pub use crate::pipeline::{Pipeline, PipelineError, PipelineOptions, RunSummary, SourceErrorPolicy};
pub use crate::posting::{canonical_url, Posting};
pub use crate::relevance::RelevanceRules;
pub use crate::scrape::{ScrapeContext, ScrapeError, SourceKind, SourceScraper};
