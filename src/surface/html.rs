// src/surface/html.rs
//! Static-HTML querying on top of `scraper`.
//!
//! `scraper::Html` is not `Send`, so nothing here keeps a parsed tree across an await:
//! pages are held as strings and elements as owned snapshots (outer HTML, text, attributes).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{Element, FrameInfo, SurfaceError};
use crate::posting::clean_text;

/// Invoked when a snapshot element is clicked; the owning surface decides what it means.
pub type ClickHandler = Arc<dyn Fn(&HtmlElement) -> Result<(), SurfaceError> + Send + Sync>;

#[derive(Clone)]
pub struct HtmlElement {
    outer: String,
    text: String,
    attrs: Vec<(String, String)>,
    on_click: Option<ClickHandler>,
}

impl fmt::Debug for HtmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlElement")
            .field("text", &self.text)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, SurfaceError> {
    Selector::parse(selector).map_err(|e| SurfaceError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn snapshot(el: ElementRef<'_>, on_click: &Option<ClickHandler>) -> HtmlElement {
    HtmlElement {
        outer: el.html(),
        text: clean_text(&el.text().collect::<Vec<_>>().join(" ")),
        attrs: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        on_click: on_click.clone(),
    }
}

/// All matches of `selector` in a full document.
pub fn select_document(
    html: &str,
    selector: &str,
    on_click: &Option<ClickHandler>,
) -> Result<Vec<HtmlElement>, SurfaceError> {
    let sel = parse_selector(selector)?;
    let doc = Html::parse_document(html);
    Ok(doc.select(&sel).map(|e| snapshot(e, on_click)).collect())
}

pub fn document_title(html: &str) -> String {
    let Ok(sel) = Selector::parse("title") else {
        return String::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&sel)
        .next()
        .map(|t| clean_text(&t.text().collect::<String>()))
        .unwrap_or_default()
}

pub fn document_frames(html: &str) -> Vec<FrameInfo> {
    let Ok(sel) = Selector::parse("iframe") else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&sel)
        .map(|f| {
            let v = f.value();
            FrameInfo {
                url: v.attr("src").unwrap_or_default().to_string(),
                name: v
                    .attr("name")
                    .or_else(|| v.attr("title"))
                    .or_else(|| v.attr("id"))
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .collect()
}

impl HtmlElement {
    pub fn outer_html(&self) -> &str {
        &self.outer
    }

    pub fn text_str(&self) -> &str {
        &self.text
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn select_within(&self, selector: &str) -> Result<Vec<HtmlElement>, SurfaceError> {
        let sel = parse_selector(selector)?;
        let frag = Html::parse_fragment(&self.outer);
        let Some(top) = frag.root_element().children().find_map(ElementRef::wrap) else {
            return Ok(Vec::new());
        };
        Ok(top
            .select(&sel)
            .filter(|e| e.id() != top.id())
            .map(|e| snapshot(e, &self.on_click))
            .collect())
    }

    fn hidden(&self) -> bool {
        if self.attr_str("hidden").is_some() {
            return true;
        }
        if self
            .attr_str("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
        {
            return true;
        }
        if self
            .attr_str("class")
            .is_some_and(|c| c.split_whitespace().any(|k| k == "d-none" || k == "hidden"))
        {
            return true;
        }
        self.attr_str("style").is_some_and(|s| {
            let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
            let s = s.to_ascii_lowercase();
            s.contains("display:none") || s.contains("visibility:hidden")
        })
    }
}

#[async_trait]
impl Element for HtmlElement {
    async fn text(&self) -> String {
        self.text.clone()
    }

    async fn attr(&self, name: &str) -> Option<String> {
        self.attr_str(name).map(str::to_string)
    }

    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, SurfaceError> {
        Ok(self
            .select_within(selector)?
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Element>)
            .collect())
    }

    async fn is_visible(&self) -> bool {
        !self.hidden()
    }

    async fn click(&self) -> Result<(), SurfaceError> {
        match &self.on_click {
            Some(handler) => handler(self),
            None => Err(SurfaceError::Unsupported("click on static html")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title> Jobs &amp; more </title></head><body>
        <div class="card" data-id="1"><h3 class="title"><a href="/j/1">Golang Dev</a></h3>
            <div class="card inner">nested</div></div>
        <div class="card d-none" data-id="2"><h3 class="title">Hidden</h3></div>
        <iframe src="https://challenges.cloudflare.com/x" title="Widget"></iframe>
    </body></html>"#;

    #[tokio::test]
    async fn nested_query_excludes_self() {
        let cards = select_document(PAGE, "div.card[data-id]", &None).unwrap();
        assert_eq!(cards.len(), 2);
        let inner = cards[0].query("div.card").await.unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].text().await, "nested");
    }

    #[tokio::test]
    async fn attrs_and_visibility() {
        let cards = select_document(PAGE, "div.card[data-id]", &None).unwrap();
        assert!(cards[0].is_visible().await);
        assert!(!cards[1].is_visible().await);
        let link = cards[0].query("h3.title a").await.unwrap();
        assert_eq!(link[0].attr("href").await.as_deref(), Some("/j/1"));
    }

    #[test]
    fn title_and_frames() {
        assert_eq!(document_title(PAGE), "Jobs & more");
        let frames = document_frames(PAGE);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].name, "Widget");
    }

    #[test]
    fn bad_selector_is_typed_error() {
        let err = select_document(PAGE, "div[", &None).unwrap_err();
        assert!(matches!(err, SurfaceError::Selector { .. }));
    }

    #[tokio::test]
    async fn click_without_handler_is_unsupported() {
        let cards = select_document(PAGE, "h3", &None).unwrap();
        assert!(matches!(
            cards[0].click().await,
            Err(SurfaceError::Unsupported(_))
        ));
    }
}
