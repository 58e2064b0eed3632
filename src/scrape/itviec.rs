// src/scrape/itviec.rs
//! ITViec (itviec.com): keyword x city listing, "Fresher" facet, preview panel per card.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{dedup_by_url, open_listing, Advisory, CardFilter, ScrapeContext, ScrapeError, SourceScraper};
use crate::evasion::{mouse_jiggle, random_delay_in, sleep_ms};
use crate::posting::{absolute_url, clean_text, fold_text, slugify, Posting, POSTED_RECENT, SALARY_FALLBACK};
use crate::surface::{first_attr, first_text, first_visible, page_text, Element, Surface};

pub const NAME: &str = "ITViec";
const BASE: &str = "https://itviec.com";
const CARD_CAP: usize = 15;

const SEL_CARDS: &str = "div.job-card";
const SEL_TITLE: &str = "h3";
const SEL_LINK: &str = "a[href*=\"/it-jobs/\"]";
const SEL_COMPANY: &str = "a.text-rich-grey, span.text-rich-grey";
const SEL_SALARY: &str = "div.salary span.ips-2";
const SEL_LOCATION: &str = "div.text-rich-grey[title]";
const SEL_EMPTY: &str = "div[data-jobs--filter-target=\"searchNoInfo\"]:not(.d-none)";
const SEL_LEVEL_DROPDOWN: &str = "#dropdown-job-level";
const SEL_FRESHER_INPUT: &str = "input[value=\"Fresher\"][name=\"job_level_names[]\"]";
const SEL_FRESHER_LABEL: &str = "label[for*=\"Fresher\"]";
const SEL_FILTER_BADGE: &str = "[data-jobs--filter-target=\"filterCounter\"]";
const SEL_PREVIEW_DESC: &str = "div.preview-job-content .job-description";
const SEL_PREVIEW_SKILLS: &str = "div.preview-job-content .job-experiences";

pub struct ItViecScraper {
    filter: CardFilter,
}

impl ItViecScraper {
    pub fn new(filter: CardFilter) -> Self {
        Self { filter }
    }
}

/// City path segments; defaults to HCM + Can Tho.
fn location_slugs(locations: &[String]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for loc in locations {
        let l = fold_text(loc);
        let slug = if l.contains("ho chi minh") || l.contains("hcm") || l.contains("saigon") {
            Some("ho-chi-minh-hcm")
        } else if l.contains("can tho") {
            Some("can-tho")
        } else if l.contains("ha noi") || l.contains("hanoi") {
            Some("ha-noi")
        } else if l.contains("da nang") {
            Some("da-nang")
        } else {
            None
        };
        if let Some(s) = slug {
            if !out.contains(&s) {
                out.push(s);
            }
        }
    }
    if out.is_empty() {
        out = vec!["ho-chi-minh-hcm", "can-tho"];
    }
    out
}

pub fn search_url(keyword: &str, location_slug: &str) -> String {
    format!("{BASE}/it-jobs/{}/{}", slugify(keyword), location_slug)
}

async fn click_first(surface: &dyn Surface, selector: &str) -> bool {
    let Ok(found) = surface.query(selector).await else {
        return false;
    };
    match found.first() {
        Some(el) => el.click().await.is_ok(),
        None => false,
    }
}

/// Open the job-level dropdown, tick "Fresher", verify the counter badge reads 1.
pub async fn apply_fresher_filter(ctx: &ScrapeContext) -> Advisory {
    let surface = ctx.surface.as_ref();
    let Some(dropdown) = first_visible(surface, &[SEL_LEVEL_DROPDOWN]).await else {
        return Advisory::Skipped("level dropdown not found".into());
    };
    if let Err(e) = dropdown.click().await {
        return Advisory::Failed(format!("dropdown: {e}"));
    }
    random_delay_in(ctx.stealth.action).await;

    let clicked =
        click_first(surface, SEL_FRESHER_INPUT).await || click_first(surface, SEL_FRESHER_LABEL).await;
    if !clicked {
        return Advisory::Failed("could not click Fresher option".into());
    }
    sleep_ms(ctx.stealth.page_settle_ms).await;

    match page_text(surface, SEL_FILTER_BADGE).await {
        Some(t) if t.trim() == "1" => Advisory::Applied,
        other => Advisory::Failed(format!("filter counter reads {other:?}")),
    }
}

async fn card_url(card: &dyn Element) -> Option<String> {
    let raw = match first_attr(card, SEL_TITLE, "data-url").await {
        Some(u) => u,
        None => first_attr(card, SEL_LINK, "href").await?,
    };
    absolute_url(BASE, &raw)
}

/// Title, company, salary, location and link from the card itself.
pub async fn extract_card(card: &dyn Element, keyword: &str) -> Option<Posting> {
    let title = first_text(card, SEL_TITLE).await?;
    let url = card_url(card).await?;

    let mut location = String::new();
    if let Ok(locs) = card.query(SEL_LOCATION).await {
        if let Some(last) = locs.last() {
            location = last.text().await;
        }
    }

    Some(Posting {
        title,
        company: first_text(card, SEL_COMPANY).await.unwrap_or_default(),
        url,
        location,
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

/// Click the card and read description + skills from the preview panel.
async fn preview_description(ctx: &ScrapeContext, card: &dyn Element) -> Option<String> {
    if let Err(e) = card.click().await {
        debug!(target: "scrape", source = NAME, error = %e, "card click unavailable");
        return None;
    }
    random_delay_in(ctx.stealth.micro).await;
    let surface = ctx.surface.as_ref();
    let desc = page_text(surface, SEL_PREVIEW_DESC).await.unwrap_or_default();
    let skills = page_text(surface, SEL_PREVIEW_SKILLS).await.unwrap_or_default();
    let joined = clean_text(&format!("{desc} {skills}"));
    (!joined.is_empty()).then_some(joined)
}

#[async_trait]
impl SourceScraper for ItViecScraper {
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        keywords: &[String],
        locations: &[String],
    ) -> Result<Vec<Posting>, ScrapeError> {
        let surface = ctx.surface.as_ref();
        let slugs = location_slugs(locations);
        let mut all = Vec::new();

        'search: for keyword in keywords {
            for slug in &slugs {
                if ctx.is_expired() {
                    warn!(target: "scrape", source = NAME, "time budget spent, returning partial results");
                    break 'search;
                }
                let url = search_url(keyword, slug);
                if !open_listing(ctx, NAME, &url).await? {
                    continue;
                }
                sleep_ms(ctx.stealth.page_settle_ms).await;
                mouse_jiggle(surface, &ctx.stealth).await;

                apply_fresher_filter(ctx).await.log(NAME, "fresher_filter");

                if first_visible(surface, &[SEL_EMPTY]).await.is_some() {
                    debug!(target: "scrape", source = NAME, url = %url, "empty state");
                    continue;
                }

                if let Err(e) = surface.wait_for(SEL_CARDS, ctx.navigation_timeout).await {
                    debug!(target: "scrape", source = NAME, url = %url, error = %e, "no cards");
                    continue;
                }
                let cards = surface.query(SEL_CARDS).await.unwrap_or_default();

                let mut kept = 0usize;
                for card in cards.iter().take(CARD_CAP) {
                    let Some(mut p) = extract_card(card.as_ref(), keyword).await else {
                        continue;
                    };
                    if let Some(desc) = preview_description(ctx, card.as_ref()).await {
                        p.description = desc;
                    }
                    if self.filter.keeps(keyword, &p) {
                        debug!(target: "scrape", source = NAME, title = %p.title, company = %p.company, "card kept");
                        all.push(p);
                        kept += 1;
                    }
                    random_delay_in(ctx.stealth.card).await;
                }
                info!(target: "scrape", source = NAME, keyword = %keyword, location = *slug, cards = cards.len(), kept, "listing done");
            }
        }

        Ok(dedup_by_url(all))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
