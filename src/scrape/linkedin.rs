// src/scrape/linkedin.rs
//! LinkedIn jobs: search page for links, then one detail page per link.
//!
//! With a cookie file the run starts on the feed and must see `#global-nav`; a missing nav
//! means the session is dead and the source stops. Without cookies the public guest search
//! is used.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::{dedup_by_url, open_listing, CardFilter, ScrapeContext, ScrapeError, SourceScraper};
use crate::evasion::{human_scroll, mouse_jiggle, random_delay_in};
use crate::posting::{absolute_url, fold_text, Posting, SALARY_FALLBACK};
use crate::surface::{first_attr, page_text, Surface};

pub const NAME: &str = "LinkedIn";
const BASE: &str = "https://www.linkedin.com";
const FEED: &str = "https://www.linkedin.com/feed/";
const SCAN_CAP: usize = 10;
const ACCEPT_CAP: usize = 5;
const POSTED_FALLBACK: &str = "Past month";

const SEL_NAV: &str = "#global-nav";
const SEL_ITEMS: &str = "li.scaffold-layout__list-item, li.jobs-search-results__list-item, ul.jobs-search__results-list > li";
const SEL_ITEM_LINK: &str = "a.job-card-container__link, a.base-card__full-link";
const SEL_DETAIL_READY: &str = ".job-details-jobs-unified-top-card__primary-description-container, .job-details-jobs-unified-top-card__job-title, h1";
const SEL_TITLE: &str = ".job-details-jobs-unified-top-card__job-title, h1";
const SEL_COMPANY: &str = ".job-details-jobs-unified-top-card__company-name, .job-details-jobs-unified-top-card__subtitle, .topcard__org-name-link";
const SEL_PRIMARY: &str = ".job-details-jobs-unified-top-card__primary-description-container";
const SEL_BULLET: &str = ".job-details-jobs-unified-top-card__bullet, .job-details-jobs-unified-top-card__workplace-type, .topcard__flavor--bullet";
const SEL_POSTED: &str = "span.posted-time-ago__text";
const SEL_DESC: &str = "[data-testid=\"expandable-text-box\"]";
const SEL_DESC_FALLBACK: &str = "#job-details, .jobs-description__content, .show-more-less-html__markup";

pub struct LinkedInScraper {
    filter: CardFilter,
    authenticated: bool,
    excluded_locations: Vec<String>,
}

impl LinkedInScraper {
    pub fn new(filter: CardFilter, authenticated: bool) -> Self {
        Self {
            filter,
            authenticated,
            excluded_locations: ["hn", "hanoi", "ha noi", "thu do"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_excluded_locations(mut self, locations: Vec<String>) -> Self {
        self.excluded_locations = locations.iter().map(|l| fold_text(l.trim())).collect();
        self
    }

    /// Phrase match on word boundaries of the folded location.
    fn is_excluded_location(&self, location: &str) -> bool {
        let words: Vec<String> = fold_text(location)
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        let padded = format!(" {} ", words.join(" "));
        self.excluded_locations
            .iter()
            .any(|ex| !ex.is_empty() && padded.contains(&format!(" {ex} ")))
    }

    async fn warm_up(&self, ctx: &ScrapeContext) -> Result<(), ScrapeError> {
        let surface = ctx.surface.as_ref();
        if !open_listing(ctx, NAME, FEED).await? {
            return Err(ScrapeError::Session {
                source_name: NAME,
                reason: "feed did not load".into(),
            });
        }
        if let Err(e) = surface.wait_for(SEL_NAV, Duration::from_secs(10)).await {
            return Err(ScrapeError::Session {
                source_name: NAME,
                reason: format!("global nav missing: {e}"),
            });
        }
        info!(target: "scrape", source = NAME, "session confirmed");
        random_delay_in(ctx.stealth.warmup).await;
        mouse_jiggle(surface, &ctx.stealth).await;
        Ok(())
    }

    async fn collect_links(&self, surface: &dyn Surface) -> Vec<String> {
        let items = surface.query(SEL_ITEMS).await.unwrap_or_default();
        let mut links = Vec::new();
        for item in items.iter().take(SCAN_CAP) {
            if let Some(href) = first_attr(item.as_ref(), SEL_ITEM_LINK, "href").await {
                if let Some(u) = absolute_url(BASE, &href) {
                    if !links.contains(&u) {
                        links.push(u);
                    }
                }
            }
        }
        links
    }

    /// `Ok(None)` for detail pages that did not render or were filtered out.
    async fn detail(
        &self,
        ctx: &ScrapeContext,
        url: &str,
        keyword: &str,
    ) -> Result<Option<Posting>, ScrapeError> {
        let surface = ctx.surface.as_ref();
        if !open_listing(ctx, NAME, url).await? {
            return Ok(None);
        }
        if surface
            .wait_for(SEL_DETAIL_READY, Duration::from_secs(5))
            .await
            .is_err()
        {
            debug!(target: "scrape", source = NAME, url, "detail not rendered");
            return Ok(None);
        }

        let Some(title) = page_text(surface, SEL_TITLE).await else {
            return Ok(None);
        };
        let company = page_text(surface, SEL_COMPANY).await.unwrap_or_default();

        let location = match page_text(surface, SEL_PRIMARY).await {
            Some(primary) => primary
                .split('·')
                .next()
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            None => page_text(surface, SEL_BULLET).await.unwrap_or_default(),
        };
        let posted_date = page_text(surface, SEL_POSTED)
            .await
            .unwrap_or_else(|| POSTED_FALLBACK.into());
        let description = match page_text(surface, SEL_DESC).await {
            Some(d) => d,
            None => page_text(surface, SEL_DESC_FALLBACK).await.unwrap_or_default(),
        };

        if self.is_excluded_location(&location) {
            debug!(target: "scrape", source = NAME, title = %title, location = %location, "excluded location");
            return Ok(None);
        }

        let p = Posting {
            location: normalize_location(&title, &description, &location),
            title,
            company,
            url: url.to_string(),
            salary: SALARY_FALLBACK.into(),
            tech_stack: keyword.to_string(),
            description,
            source: NAME.into(),
            posted_date,
            match_score: None,
        };
        Ok(self.filter.keeps(keyword, &p).then_some(p))
    }
}

/// HCM / Can Tho / Remote when the posting text says so, else the raw location.
pub fn normalize_location(title: &str, description: &str, location: &str) -> String {
    let all = fold_text(&format!("{title} {description} {location}"));
    if all.contains("hcm") || all.contains("ho chi minh") || all.contains("saigon") {
        "HCM".into()
    } else if all.contains("can tho") {
        "Can Tho".into()
    } else if all.contains("remote") {
        "Remote".into()
    } else if location.is_empty() {
        "Unknown location".into()
    } else {
        location.to_string()
    }
}

/// Guest-visible search: entry level + associate + mid, posted in the last 30 days.
pub fn search_url(keyword: &str, location: &str) -> String {
    let mut u = match Url::parse(&format!("{BASE}/jobs/search/")) {
        Ok(u) => u,
        Err(_) => return format!("{BASE}/jobs/search/"),
    };
    u.query_pairs_mut()
        .append_pair("keywords", keyword.trim())
        .append_pair("location", location.trim())
        .append_pair("f_E", "1,2,3")
        .append_pair("f_TPR", "r2592000");
    u.to_string()
}

#[async_trait]
impl SourceScraper for LinkedInScraper {
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        keywords: &[String],
        locations: &[String],
    ) -> Result<Vec<Posting>, ScrapeError> {
        let surface = ctx.surface.as_ref();
        if self.authenticated {
            self.warm_up(ctx).await?;
        } else {
            debug!(target: "scrape", source = NAME, "no cookies, guest mode");
        }

        let default_location = ["Vietnam".to_string()];
        let locations = if locations.is_empty() {
            &default_location[..]
        } else {
            locations
        };

        let mut all = Vec::new();
        'search: for keyword in keywords {
            for location in locations {
                if ctx.is_expired() {
                    warn!(target: "scrape", source = NAME, "time budget spent, returning partial results");
                    break 'search;
                }
                let url = search_url(keyword, location);
                if !open_listing(ctx, NAME, &url).await? {
                    continue;
                }
                if let Err(e) = surface.wait_for(SEL_ITEMS, Duration::from_secs(15)).await {
                    debug!(target: "scrape", source = NAME, url = %url, error = %e, "job list empty");
                    continue;
                }
                random_delay_in(ctx.stealth.action).await;
                human_scroll(surface, &ctx.stealth).await;

                let links = self.collect_links(surface).await;
                let mut accepted = 0usize;
                for link in &links {
                    if accepted >= ACCEPT_CAP {
                        break;
                    }
                    if ctx.is_expired() {
                        break 'search;
                    }
                    if let Some(p) = self.detail(ctx, link, keyword).await? {
                        debug!(target: "scrape", source = NAME, title = %p.title, location = %p.location, "posting kept");
                        all.push(p);
                        accepted += 1;
                    }
                    random_delay_in(ctx.stealth.card).await;
                }
                info!(target: "scrape", source = NAME, keyword = %keyword, location = %location, links = links.len(), accepted, "search done");
            }
        }

        Ok(dedup_by_url(all))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
