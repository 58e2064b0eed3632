// src/scrape/topcv.rs
//! TopCV (topcv.vn): keyword x experience-level search pages, server-rendered cards.

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use super::{dedup_by_url, open_listing, Advisory, CardFilter, ScrapeContext, ScrapeError, SourceScraper};
use crate::evasion::{mouse_jiggle, random_delay_in, sleep_ms, smooth_scroll};
use crate::posting::{absolute_url, fold_text, slugify, Posting, POSTED_RECENT, SALARY_FALLBACK};
use crate::surface::{first_attr, first_text, first_visible, Element, Surface};

pub const NAME: &str = "TopCV";
const HOME: &str = "https://www.topcv.vn/";
const CARD_CAP: usize = 20;
/// 1: no experience, 2: under one year, 3: one year.
const EXP_LEVELS: [u8; 3] = [1, 2, 3];

const SEL_CARDS: &str = ".job-item-search-result";
const SEL_CARDS_FALLBACK: &str = ".job-item";
const SEL_TITLE: &str = "h3.title a, .title-block a, a.title";
const SEL_COMPANY: &str = ".company-name, a.company";
const SEL_SALARY: &str = ".title-salary, .salary";
const SEL_LOCATION: &str = ".address, .location, .label-address";
const SEL_POSTED: &str = ".label-update";
const SEL_NO_RESULTS: &str = ".none-suitable-job";
const SEL_SURVEY: &str = "#modal-survey-reliability";
const SEL_SURVEY_CANCEL: &str = "#modal-survey-reliability .btn-cancel";

pub struct TopCvScraper {
    filter: CardFilter,
}

impl TopCvScraper {
    pub fn new(filter: CardFilter) -> Self {
        Self { filter }
    }
}

/// `l2` Ho Chi Minh, `l20` Can Tho, `l1` Ha Noi, `l3` Da Nang. Defaults to HCM + Can Tho.
fn location_codes(locations: &[String]) -> String {
    let mut codes: Vec<&str> = Vec::new();
    for loc in locations {
        let l = fold_text(loc);
        let code = if l.contains("ho chi minh") || l.contains("hcm") || l.contains("saigon") {
            Some("l2")
        } else if l.contains("can tho") {
            Some("l20")
        } else if l.contains("ha noi") || l.contains("hanoi") {
            Some("l1")
        } else if l.contains("da nang") {
            Some("l3")
        } else {
            None
        };
        if let Some(c) = code {
            if !codes.contains(&c) {
                codes.push(c);
            }
        }
    }
    if codes.is_empty() {
        "l2_l20".into()
    } else {
        codes.join("_")
    }
}

pub fn search_url(keyword: &str, exp: u8, locations: &[String]) -> String {
    format!(
        "https://www.topcv.vn/tim-viec-lam-{}?exp={}&sort=new&type_keyword=1&sba=1&locations={}&saturday_status=0",
        slugify(keyword),
        exp,
        location_codes(locations)
    )
}

/// One card to a posting; `None` when title or link is missing.
pub async fn extract_card(card: &dyn Element, keyword: &str) -> Option<Posting> {
    let title = first_text(card, SEL_TITLE).await?;
    let href = first_attr(card, SEL_TITLE, "href").await?;
    let url = absolute_url(HOME, &href)?;
    Some(Posting {
        title,
        company: first_text(card, SEL_COMPANY).await.unwrap_or_default(),
        url,
        location: first_text(card, SEL_LOCATION).await.unwrap_or_default(),
        salary: first_text(card, SEL_SALARY)
            .await
            .unwrap_or_else(|| SALARY_FALLBACK.into()),
        tech_stack: keyword.to_string(),
        description: String::new(),
        source: NAME.into(),
        posted_date: first_text(card, SEL_POSTED)
            .await
            .unwrap_or_else(|| POSTED_RECENT.into()),
        match_score: None,
    })
}

async fn dismiss_survey(ctx: &ScrapeContext) -> Advisory {
    let surface = ctx.surface.as_ref();
    if first_visible(surface, &[SEL_SURVEY]).await.is_none() {
        return Advisory::Skipped("no survey modal".into());
    }
    let Some(cancel) = first_visible(surface, &[SEL_SURVEY_CANCEL]).await else {
        return Advisory::Failed("survey modal without cancel button".into());
    };
    match cancel.click().await {
        Ok(()) => Advisory::Applied,
        Err(e) => Advisory::Failed(e.to_string()),
    }
}

async fn listing_cards(surface: &dyn Surface) -> Vec<Box<dyn Element>> {
    let cards = surface.query(SEL_CARDS).await.unwrap_or_default();
    if !cards.is_empty() {
        return cards;
    }
    surface.query(SEL_CARDS_FALLBACK).await.unwrap_or_default()
}

#[async_trait]
impl SourceScraper for TopCvScraper {
    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        keywords: &[String],
        locations: &[String],
    ) -> Result<Vec<Posting>, ScrapeError> {
        let surface = ctx.surface.as_ref();
        let mut all = Vec::new();

        if open_listing(ctx, NAME, HOME).await? {
            random_delay_in(ctx.stealth.warmup).await;
            mouse_jiggle(surface, &ctx.stealth).await;
        }

        'search: for keyword in keywords {
            for exp in EXP_LEVELS {
                if ctx.is_expired() {
                    warn!(target: "scrape", source = NAME, "time budget spent, returning partial results");
                    break 'search;
                }
                let url = search_url(keyword, exp, locations);
                surface
                    .set_extra_headers(vec![("Referer".into(), HOME.into())])
                    .await;
                if !open_listing(ctx, NAME, &url).await? {
                    continue;
                }

                random_delay_in(ctx.stealth.action).await;
                mouse_jiggle(surface, &ctx.stealth).await;
                smooth_scroll(surface, &ctx.stealth).await;

                if first_visible(surface, &[SEL_NO_RESULTS]).await.is_some() {
                    debug!(target: "scrape", source = NAME, keyword = %keyword, exp, "no suitable job");
                    continue;
                }

                let cards = listing_cards(surface).await;
                if cards.is_empty() {
                    debug!(target: "scrape", source = NAME, url = %url, "no cards");
                    continue;
                }

                sleep_ms(ctx.stealth.page_settle_ms).await;
                dismiss_survey(ctx).await.log(NAME, "survey_modal");

                let mut kept = 0usize;
                for card in &cards {
                    if kept >= CARD_CAP {
                        break;
                    }
                    let pause = rand::rng().random_bool(0.2);
                    if pause {
                        random_delay_in(ctx.stealth.card).await;
                    }
                    let Some(p) = extract_card(card.as_ref(), keyword).await else {
                        continue;
                    };
                    if self.filter.keeps(keyword, &p) {
                        debug!(target: "scrape", source = NAME, title = %p.title, company = %p.company, "card kept");
                        all.push(p);
                        kept += 1;
                    }
                }
                info!(target: "scrape", source = NAME, keyword = %keyword, exp, cards = cards.len(), kept, "listing done");
            }
        }

        Ok(dedup_by_url(all))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_shape() {
        let u = search_url("Golang Developer", 2, &["Hồ Chí Minh".into(), "Cần Thơ".into()]);
        assert_eq!(
            u,
            "https://www.topcv.vn/tim-viec-lam-golang-developer?exp=2&sort=new&type_keyword=1&sba=1&locations=l2_l20&saturday_status=0"
        );
    }

    #[test]
    fn unknown_locations_fall_back() {
        assert_eq!(location_codes(&["Mars".into()]), "l2_l20");
        assert_eq!(location_codes(&["Hà Nội".into(), "Hanoi".into()]), "l1");
    }
}
