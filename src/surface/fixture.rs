// src/surface/fixture.rs
//! Scripted `Surface` serving HTML by URL substring. Used by tests and offline runs.
//!
//! Each route holds a queue of pages: `goto` and `settle` advance it until the last page,
//! which then repeats. That is enough to script "challenge, then listing" sequences.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::html::{document_frames, document_title, select_document, ClickHandler, HtmlElement};
use super::{Element, FrameInfo, Surface, SurfaceError, Viewport};

#[derive(Debug)]
struct Route {
    key: String,
    pages: VecDeque<String>,
}

impl Route {
    fn next_page(&mut self) -> String {
        if self.pages.len() > 1 {
            self.pages.pop_front().unwrap_or_default()
        } else {
            self.pages.front().cloned().unwrap_or_default()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    routes: Vec<Route>,
    failures: Vec<String>,
    panels: Vec<(String, String)>,
    current_url: String,
    current_route: Option<usize>,
    base_html: String,
    html: String,
    loaded: bool,
    visited: Vec<String>,
    clicked: Vec<String>,
    captures: Vec<PathBuf>,
    headers: Vec<(String, String)>,
    pointer_moves: usize,
    scrolls: usize,
}

impl State {
    /// Longest matching key wins, so specific routes can shadow generic ones.
    fn route_for(&self, url: &str) -> Option<usize> {
        self.routes
            .iter()
            .enumerate()
            .filter(|(_, r)| url.contains(r.key.as_str()))
            .max_by_key(|(_, r)| r.key.len())
            .map(|(i, _)| i)
    }
}

#[derive(Clone)]
pub struct FixtureSurface {
    state: Arc<Mutex<State>>,
    viewport: Option<Viewport>,
}

impl Default for FixtureSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(m: &Mutex<State>) -> MutexGuard<'_, State> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl FixtureSurface {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            viewport: Some(Viewport {
                width: 1366.0,
                height: 768.0,
            }),
        }
    }

    pub fn without_viewport(mut self) -> Self {
        self.viewport = None;
        self
    }

    /// Serve `html` for any URL containing `key`.
    pub fn page(self, key: &str, html: &str) -> Self {
        self.pages(key, &[html])
    }

    /// Serve `pages` in order for URLs containing `key`; the last one repeats.
    pub fn pages(self, key: &str, pages: &[&str]) -> Self {
        lock(&self.state).routes.push(Route {
            key: key.to_string(),
            pages: pages.iter().map(|p| p.to_string()).collect(),
        });
        self
    }

    /// Navigation to URLs containing `key` times out.
    pub fn fail(self, key: &str) -> Self {
        lock(&self.state).failures.push(key.to_string());
        self
    }

    /// Clicking an element whose outer HTML contains `marker` appends `html` to the page.
    pub fn on_click(self, marker: &str, html: &str) -> Self {
        lock(&self.state)
            .panels
            .push((marker.to_string(), html.to_string()));
        self
    }

    pub fn visited(&self) -> Vec<String> {
        lock(&self.state).visited.clone()
    }

    pub fn clicked(&self) -> Vec<String> {
        lock(&self.state).clicked.clone()
    }

    pub fn captures(&self) -> Vec<PathBuf> {
        lock(&self.state).captures.clone()
    }

    pub fn extra_headers(&self) -> Vec<(String, String)> {
        lock(&self.state).headers.clone()
    }

    pub fn pointer_moves(&self) -> usize {
        lock(&self.state).pointer_moves
    }

    pub fn scrolls(&self) -> usize {
        lock(&self.state).scrolls
    }

    fn click_handler(&self) -> Option<ClickHandler> {
        let state = Arc::clone(&self.state);
        let handler: ClickHandler = Arc::new(move |el: &HtmlElement| {
            let mut st = lock(&state);
            let outer = el.outer_html().to_string();
            st.clicked.push(el.text_str().to_string());
            let panel = st
                .panels
                .iter()
                .find(|(marker, _)| outer.contains(marker.as_str()))
                .map(|(_, html)| html.clone());
            if let Some(panel) = panel {
                st.html = format!("{}{}", st.base_html, panel);
            }
            Ok(())
        });
        Some(handler)
    }

    fn html(&self) -> Result<String, SurfaceError> {
        let st = lock(&self.state);
        if !st.loaded {
            return Err(SurfaceError::NoPage);
        }
        Ok(st.html.clone())
    }
}

#[async_trait]
impl Surface for FixtureSurface {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), SurfaceError> {
        let mut st = lock(&self.state);
        st.visited.push(url.to_string());
        if st.failures.iter().any(|k| url.contains(k.as_str())) {
            return Err(SurfaceError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        let Some(idx) = st.route_for(url) else {
            return Err(SurfaceError::Navigation {
                url: url.to_string(),
                reason: "no fixture".into(),
            });
        };
        let html = st.routes[idx].next_page();
        st.current_url = url.to_string();
        st.current_route = Some(idx);
        st.base_html = html.clone();
        st.html = html;
        st.loaded = true;
        Ok(())
    }

    async fn current_url(&self) -> String {
        lock(&self.state).current_url.clone()
    }

    async fn title(&self) -> String {
        self.html().map(|h| document_title(&h)).unwrap_or_default()
    }

    async fn frames(&self) -> Vec<FrameInfo> {
        self.html().map(|h| document_frames(&h)).unwrap_or_default()
    }

    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, SurfaceError> {
        let html = self.html()?;
        Ok(select_document(&html, selector, &self.click_handler())?
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Element>)
            .collect())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<(), SurfaceError> {
        if self.query(selector).await?.is_empty() {
            return Err(SurfaceError::NotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn settle(&self, _timeout: Duration) -> Result<(), SurfaceError> {
        let mut st = lock(&self.state);
        let Some(idx) = st.current_route else {
            return Err(SurfaceError::NoPage);
        };
        let html = st.routes[idx].next_page();
        st.base_html = html.clone();
        st.html = html;
        Ok(())
    }

    async fn set_extra_headers(&self, headers: Vec<(String, String)>) {
        lock(&self.state).headers = headers;
    }

    async fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    async fn mouse_move(&self, _x: f64, _y: f64) -> Result<(), SurfaceError> {
        lock(&self.state).pointer_moves += 1;
        Ok(())
    }

    async fn wheel(&self, _delta_x: f64, _delta_y: f64) -> Result<(), SurfaceError> {
        lock(&self.state).scrolls += 1;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), SurfaceError> {
        lock(&self.state).scrolls += 1;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<PathBuf, SurfaceError> {
        let html = self.html()?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, html).await?;
        lock(&self.state).captures.push(path.to_path_buf());
        Ok(path.to_path_buf())
    }
}
