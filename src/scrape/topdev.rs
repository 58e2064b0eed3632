// src/scrape/topdev.rs
//! TopDev (topdev.vn): keyword x level (Intern, Fresher) search, card click for detail panel.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::{dedup_by_url, open_listing, Advisory, CardFilter, ScrapeContext, ScrapeError, SourceScraper};
use crate::evasion::{mouse_jiggle, random_delay_in, smooth_scroll};
use crate::posting::{absolute_url, fold_text, truncate_chars, Posting, POSTED_RECENT, SALARY_FALLBACK};
use crate::surface::{first_attr, first_text, first_visible, page_text, Element};

pub const NAME: &str = "TopDev";
const BASE: &str = "https://topdev.vn";
const CARD_CAP: usize = 15;
const DESCRIPTION_CAP: usize = 5000;
const SUGGESTION_MARKER: &str = "jobs you may be interested in";

/// (id, label)
const LEVELS: [(&str, &str); 2] = [("1616", "Intern"), ("1617", "Fresher")];

const SEL_CARDS: &str = "div.text-card-foreground.shadow.cursor-pointer.bg-white";
const SEL_TITLE: &str = "a[href*=\"/detail-jobs/\"]";
const SEL_COMPANY: &str = "span.text-text-500.line-clamp-1, a[href*=\"/companies/\"]";
const SEL_SALARY: &str = "span.text-brand-500";
const SEL_CLAMPED: &str = "span.line-clamp-1";
const SEL_HEADLINE: &str = "span.font-semibold.text-brand-500";
const SEL_PROMO_CLOSE: &str = "[aria-label=\"Close\"]";
const SEL_DETAIL: &str = "div.overflow-auto[class*=\"h-[54vh]\"], div[class*=\"xl:h-[66vh]\"]";

const CITY_MARKERS: &[&str] = &["ho chi minh", "can tho", "ha noi", "da nang"];

pub struct TopDevScraper {
    filter: CardFilter,
}

impl TopDevScraper {
    pub fn new(filter: CardFilter) -> Self {
        Self { filter }
    }
}

/// Province ids: 79 HCM, 92 Can Tho, 01 Ha Noi, 48 Da Nang. Defaults to HCM + Can Tho.
fn region_ids(locations: &[String]) -> String {
    let mut ids: Vec<&str> = Vec::new();
    for loc in locations {
        let l = fold_text(loc);
        let id = if l.contains("ho chi minh") || l.contains("hcm") || l.contains("saigon") {
            Some("79")
        } else if l.contains("can tho") {
            Some("92")
        } else if l.contains("ha noi") || l.contains("hanoi") {
            Some("01")
        } else if l.contains("da nang") {
            Some("48")
        } else {
            None
        };
        if let Some(i) = id {
            if !ids.contains(&i) {
                ids.push(i);
            }
        }
    }
    if ids.is_empty() {
        "79,92".into()
    } else {
        ids.join(",")
    }
}

pub fn search_url(keyword: &str, level_id: &str, locations: &[String]) -> String {
    let fallback = format!("{BASE}/jobs/search");
    let Ok(mut u) = Url::parse(&fallback) else {
        return fallback;
    };
    u.query_pairs_mut()
        .append_pair("keyword", keyword.trim())
        .append_pair("page", "1")
        .append_pair("region_ids", &region_ids(locations))
        .append_pair("job_levels_ids", level_id);
    u.to_string()
}

fn is_promo(url: &str) -> bool {
    url.contains("hiring-reward") || url.contains("promo")
}

/// Promo interstitial: close it, else navigate back to the search once.
async fn leave_promo(ctx: &ScrapeContext, search: &str) -> Advisory {
    let surface = ctx.surface.as_ref();
    if !is_promo(&surface.current_url().await) {
        return Advisory::Skipped("no promo redirect".into());
    }
    if let Some(close) = first_visible(surface, &[SEL_PROMO_CLOSE]).await {
        if close.click().await.is_ok() {
            random_delay_in(ctx.stealth.action).await;
            return Advisory::Applied;
        }
    }
    match surface.goto(search, ctx.navigation_timeout).await {
        Ok(()) if !is_promo(&surface.current_url().await) => Advisory::Applied,
        Ok(()) => Advisory::Failed("promo redirect persists".into()),
        Err(e) => Advisory::Failed(e.to_string()),
    }
}

async fn only_suggestions(ctx: &ScrapeContext) -> bool {
    let Ok(heads) = ctx.surface.query(SEL_HEADLINE).await else {
        return false;
    };
    for h in heads {
        if h.text().await.to_lowercase().contains(SUGGESTION_MARKER) {
            return true;
        }
    }
    false
}

async fn card_location(card: &dyn Element) -> String {
    let Ok(spans) = card.query(SEL_CLAMPED).await else {
        return "Unknown".into();
    };
    for s in spans {
        let t = s.text().await;
        let f = fold_text(&t);
        if CITY_MARKERS.iter().any(|m| f.contains(m)) {
            return t;
        }
    }
    "Unknown".into()
}

pub async fn extract_card(card: &dyn Element, keyword: &str) -> Option<Posting> {
    let title = first_text(card, SEL_TITLE).await?;
    let href = first_attr(card, SEL_TITLE, "href").await?;
    let url = absolute_url(BASE, &href)?;
    let company = first_text(card, SEL_COMPANY)
        .await
        .map(|c| c.replace("Logo", "").trim().to_string())
        .unwrap_or_default();
    Some(Posting {
        title,
        company,
        url,
        location: card_location(card).await,
        salary: first_text(card, SEL_SALARY)
            .await
            .unwrap_or_else(|| SALARY_FALLBACK.into()),
        tech_stack: keyword.to_string(),
        description: String::new(),
        source: NAME.into(),
        posted_date: POSTED_RECENT.into(),
        match_score: None,
    })
}

async fn detail_description(ctx: &ScrapeContext, card: &dyn Element) -> Option<String> {
    if let Err(e) = card.click().await {
        debug!(target: "scrape", source = NAME, error = %e, "card click unavailable");
        return None;
    }
    random_delay_in(ctx.stealth.action).await;
    page_text(ctx.surface.as_ref(), SEL_DETAIL)
        .await
        .map(|d| truncate_chars(&d, DESCRIPTION_CAP))
}

#[async_trait]
impl SourceScraper for TopDevScraper {
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        keywords: &[String],
        locations: &[String],
    ) -> Result<Vec<Posting>, ScrapeError> {
        let surface = ctx.surface.as_ref();
        let mut all = Vec::new();

        'search: for keyword in keywords {
            for (level_id, level) in LEVELS {
                if ctx.is_expired() {
                    warn!(target: "scrape", source = NAME, "time budget spent, returning partial results");
                    break 'search;
                }
                let url = search_url(keyword, level_id, locations);
                if !open_listing(ctx, NAME, &url).await? {
                    continue;
                }
                leave_promo(ctx, &url).await.log(NAME, "promo_redirect");

                random_delay_in(ctx.stealth.action).await;
                mouse_jiggle(surface, &ctx.stealth).await;
                smooth_scroll(surface, &ctx.stealth).await;

                if only_suggestions(ctx).await {
                    debug!(target: "scrape", source = NAME, keyword = %keyword, level, "no exact matches");
                    continue;
                }

                let cards = surface.query(SEL_CARDS).await.unwrap_or_default();
                if cards.is_empty() {
                    debug!(target: "scrape", source = NAME, url = %url, "no cards");
                    continue;
                }

                let mut kept = 0usize;
                for card in cards.iter().take(CARD_CAP) {
                    let Some(mut p) = extract_card(card.as_ref(), keyword).await else {
                        continue;
                    };
                    random_delay_in(ctx.stealth.card).await;
                    if let Some(desc) = detail_description(ctx, card.as_ref()).await {
                        p.description = desc;
                    }
                    if self.filter.keeps(keyword, &p) {
                        debug!(target: "scrape", source = NAME, title = %p.title, company = %p.company, "card kept");
                        all.push(p);
                        kept += 1;
                    }
                }
                info!(target: "scrape", source = NAME, keyword = %keyword, level, cards = cards.len(), kept, "listing done");
            }
        }

        Ok(dedup_by_url(all))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
