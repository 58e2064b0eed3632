// src/surface/mod.rs
//! Page-like capability the scrapers drive: navigate, query, wait, pointer/scroll.
//!
//! Implementations:
//! - [`http::HttpSurface`] fetches static HTML with `reqwest` and queries it with `scraper`.
//! - [`fixture::FixtureSurface`] serves scripted HTML for tests and dry runs.
//!
//! A real browser driver plugs in by implementing [`Surface`] and [`Element`].

pub mod cookies;
pub mod fixture;
pub mod html;
pub mod http;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
    #[error("no element matches `{selector}`")]
    NotFound { selector: String },
    #[error("no page loaded")]
    NoPage,
    #[error("unsupported on this surface: {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SurfaceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SurfaceError::Timeout { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[async_trait]
pub trait Element: Send + Sync {
    /// Visible text, whitespace-collapsed.
    async fn text(&self) -> String;
    async fn attr(&self, name: &str) -> Option<String>;
    /// Descendants matching `selector` (never the element itself).
    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, SurfaceError>;
    async fn is_visible(&self) -> bool;
    async fn click(&self) -> Result<(), SurfaceError>;
}

#[async_trait]
pub trait Surface: Send + Sync {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), SurfaceError>;
    async fn current_url(&self) -> String;
    async fn title(&self) -> String;
    async fn frames(&self) -> Vec<FrameInfo>;
    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, SurfaceError>;
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), SurfaceError>;
    /// Let pending transitions finish (e.g. a challenge page redirecting on its own).
    async fn settle(&self, timeout: Duration) -> Result<(), SurfaceError>;
    /// Headers sent with every following navigation; replaces the previous set.
    async fn set_extra_headers(&self, headers: Vec<(String, String)>);
    async fn viewport(&self) -> Option<Viewport>;
    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), SurfaceError>;
    async fn wheel(&self, delta_x: f64, delta_y: f64) -> Result<(), SurfaceError>;
    async fn scroll_to_bottom(&self) -> Result<(), SurfaceError>;
    /// Capture the page; returns the path actually written.
    async fn screenshot(&self, path: &Path) -> Result<PathBuf, SurfaceError>;
}

/// Text of the first match of `selector` under `el`, if non-empty.
pub async fn first_text(el: &dyn Element, selector: &str) -> Option<String> {
    let found = el.query(selector).await.ok()?;
    for e in found {
        let t = e.text().await;
        if !t.is_empty() {
            return Some(t);
        }
    }
    None
}

/// Attribute `name` of the first match of `selector` under `el` that carries it.
pub async fn first_attr(el: &dyn Element, selector: &str, name: &str) -> Option<String> {
    let found = el.query(selector).await.ok()?;
    for e in found {
        if let Some(v) = e.attr(name).await {
            if !v.trim().is_empty() {
                return Some(v);
            }
        }
    }
    None
}

/// Text of the first page-level match of `selector`, if non-empty.
pub async fn page_text(surface: &dyn Surface, selector: &str) -> Option<String> {
    let found = surface.query(selector).await.ok()?;
    for e in found {
        let t = e.text().await;
        if !t.is_empty() {
            return Some(t);
        }
    }
    None
}

/// First visible page-level match among `selectors`, tried in order.
pub async fn first_visible(
    surface: &dyn Surface,
    selectors: &[&str],
) -> Option<Box<dyn Element>> {
    for sel in selectors {
        let Ok(found) = surface.query(sel).await else {
            continue;
        };
        for e in found {
            if e.is_visible().await {
                return Some(e);
            }
        }
    }
    None
}
