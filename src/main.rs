//! Job scout: one discovery run per invocation.
//! Scrapes the configured job sites, filters and scores postings, skips ones already
//! notified in the last 30 days, and sends the rest to Telegram (or the log).
//!
//! Schedule it with cron or a systemd timer; see `config/job_scout.toml` for settings.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use job_scout::config::AppConfig;
use job_scout::dedup::SeenCache;
use job_scout::notify::telegram::TelegramNotifier;
use job_scout::notify::{LogNotifier, Notifier};
use job_scout::pipeline::{Pipeline, PipelineOptions};
use job_scout::scrape::{ScrapeContext, SourceKind, SourceScraper};
use job_scout::screenshot::ScreenshotDebugger;
use job_scout::surface::cookies::load_source_cookies;
use job_scout::surface::http::HttpSurface;

#[derive(Debug, Parser)]
#[command(name = "job-scout", version, about = "Scrape job sites and notify about new relevant postings")]
struct Cli {
    /// Config file (overrides $JOB_SCOUT_CONFIG and config/job_scout.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Scrape, filter and dedup, but send nothing and mark nothing seen.
    #[arg(long)]
    dry_run: bool,

    /// Only run this source (repeatable): topcv, itviec, linkedin, topdev.
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// Log as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("job_scout=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Registry entries to run: the config's list, narrowed by `--source` when given.
fn select_sources(cfg: &AppConfig, only: &[String]) -> Result<Vec<SourceKind>> {
    let configured = cfg.source_kinds()?;
    if only.is_empty() {
        return Ok(configured);
    }
    let mut out = Vec::new();
    for name in only {
        let kind =
            SourceKind::parse(name).ok_or_else(|| anyhow!("unknown source `{name}` in --source"))?;
        if !out.contains(&kind) {
            out.push(kind);
        }
    }
    Ok(out)
}

fn build_notifier(cfg: &AppConfig) -> Box<dyn Notifier> {
    match cfg.telegram_credentials() {
        Some((token, chat_id)) => Box::new(TelegramNotifier::new(token, chat_id)),
        None => {
            warn!("no Telegram credentials configured, postings go to the log");
            Box::new(LogNotifier)
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let rules = cfg.relevance_rules().context("compiling relevance rules")?;
    let kinds = select_sources(&cfg, &cli.sources)?;

    let now = Utc::now().timestamp() as f64;
    let surface = HttpSurface::new()?;
    for kind in &kinds {
        surface.add_cookies(load_source_cookies(&cfg.paths.cookies_dir, kind.as_str(), now));
    }

    let scrapers: Vec<Box<dyn SourceScraper>> = kinds.iter().map(|k| k.build(&cfg.search)).collect();
    let cache = SeenCache::open(&cfg.paths.cache_dir);
    let notifier = build_notifier(&cfg);
    let options = PipelineOptions {
        on_source_error: cfg.run.on_source_error,
        send_delay: cfg.run.send_delay(),
        max_notifications: cfg.run.max_notifications,
        results_dir: cfg.paths.logs_dir.clone(),
        dry_run: cli.dry_run,
    };

    let ctx = ScrapeContext::new(Arc::new(surface), cfg.run.timeout())
        .with_stealth(cfg.stealth.clone())
        .with_screenshots(ScreenshotDebugger::new(&cfg.paths.screenshots_dir))
        .with_navigation_timeout(cfg.run.navigation_timeout());

    info!(
        sources = ?kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
        keywords = ?cfg.search.keywords,
        dry_run = cli.dry_run,
        seen = cache.len(),
        "starting run"
    );

    let pipeline = Pipeline::new(scrapers, rules, cache, notifier, options);
    match pipeline.run(&ctx, &cfg.search.keywords, &cfg.search.locations).await {
        Ok(summary) => {
            info!(
                scraped = summary.scraped,
                admitted = summary.admitted,
                unseen = summary.unseen,
                notified = summary.notified,
                failed = summary.failed_sends,
                timed_out = summary.timed_out,
                "done"
            );
            Ok(true)
        }
        Err(e) => {
            error!(error = %e, "run aborted");
            if !cli.dry_run {
                let text = format!("Job scout run aborted: {e}");
                if let Err(se) = pipeline.notifier().send_status(&text).await {
                    warn!(error = %format!("{se:#}"), "abort status message failed");
                }
            }
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!(error = %format!("{e:#}"), "job scout failed");
            ExitCode::from(1)
        }
    }
}
