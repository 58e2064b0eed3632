// src/metrics.rs
//! Counter names and one-time descriptions. No recorder is installed here; the macros are
//! no-ops unless the embedding process installs one.

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

pub const SCRAPE_POSTINGS: &str = "scrape_postings_total";
pub const SCRAPE_ERRORS: &str = "scrape_errors_total";
pub const SCRAPE_CHALLENGES: &str = "scrape_challenges_total";
pub const PIPELINE_ADMITTED: &str = "pipeline_admitted_total";
pub const PIPELINE_UNSEEN: &str = "pipeline_unseen_total";
pub const NOTIFY_SENT: &str = "notify_sent_total";
pub const NOTIFY_ERRORS: &str = "notify_errors_total";
pub const PIPELINE_LAST_RUN_TS: &str = "pipeline_last_run_ts";

pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(SCRAPE_POSTINGS, "Postings returned by a source scraper.");
        describe_counter!(
            SCRAPE_ERRORS,
            "Navigation or extraction errors per source (skipped combinations, failed sources)."
        );
        describe_counter!(SCRAPE_CHALLENGES, "Anti-bot challenge pages detected per source.");
        describe_counter!(PIPELINE_ADMITTED, "Postings that passed the relevance gate.");
        describe_counter!(PIPELINE_UNSEEN, "Admitted postings not in the seen cache.");
        describe_counter!(NOTIFY_SENT, "Postings delivered to the notifier.");
        describe_counter!(NOTIFY_ERRORS, "Failed notifier sends.");
        describe_gauge!(PIPELINE_LAST_RUN_TS, "Unix ts when the pipeline last finished.");
    });
}
