// src/scrape/challenge.rs
//! Challenge gate: detect, wait, try one dismissal, re-check, capture and fail.

use std::time::Duration;

use metrics::counter;
use tracing::{info, warn};

use super::{Advisory, ScrapeContext, ScrapeError};
use crate::evasion::{mouse_jiggle, page_is_challenged, random_delay_in, sleep_ms};
use crate::metrics::SCRAPE_CHALLENGES;
use crate::surface::first_visible;

const VERIFY_CONTROLS: &[&str] = &[
    "input[type=checkbox]",
    ".ctp-checkbox-label",
    "#challenge-stage",
    "button#onetrust-accept-btn-handler",
    "button[data-testid=consent-accept]",
];

/// Click the first visible verification / consent control.
pub async fn try_dismiss(ctx: &ScrapeContext) -> Advisory {
    let surface = ctx.surface.as_ref();
    let Some(control) = first_visible(surface, VERIFY_CONTROLS).await else {
        return Advisory::Skipped("no verification control".into());
    };
    mouse_jiggle(surface, &ctx.stealth).await;
    match control.click().await {
        Ok(()) => {
            random_delay_in(ctx.stealth.action).await;
            Advisory::Applied
        }
        Err(e) => Advisory::Failed(e.to_string()),
    }
}

/// `Ok(())` when the page is not (or no longer) a challenge.
pub async fn pass_challenge(ctx: &ScrapeContext, source: &'static str) -> Result<(), ScrapeError> {
    let surface = ctx.surface.as_ref();
    if !page_is_challenged(surface).await {
        return Ok(());
    }

    let url = surface.current_url().await;
    counter!(SCRAPE_CHALLENGES, "source" => source).increment(1);
    warn!(target: "scrape", source, url = %url, wait_ms = ctx.stealth.challenge_wait_ms, "challenge detected, waiting");
    sleep_ms(ctx.stealth.challenge_wait_ms).await;

    try_dismiss(ctx).await.log(source, "challenge_dismiss");

    let settle = ctx.navigation_timeout.min(Duration::from_secs(15));
    if let Err(e) = surface.settle(settle).await {
        warn!(target: "scrape", source, error = %e, "settle after challenge failed");
    }

    if !page_is_challenged(surface).await {
        info!(target: "scrape", source, "challenge cleared");
        return Ok(());
    }

    let screenshot = ctx
        .screenshots
        .capture(surface, &format!("{source}_challenge"))
        .await;
    Err(ScrapeError::Challenge {
        source_name: source,
        url,
        screenshot,
    })
}
