// src/surface/http.rs
//! `Surface` over plain HTTP: one GET per navigation, DOM queries on the fetched HTML.
//!
//! No script execution, so pointer and scroll calls are no-ops and `click` is unsupported.
//! Client-rendered listings come back empty here; a browser-backed surface covers those.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::cookies::{cookie_header, Cookie};
use super::html::{document_frames, document_title, select_document};
use super::{Element, FrameInfo, Surface, SurfaceError, Viewport};
use crate::evasion::random_user_agent;

#[derive(Debug, Default)]
struct PageState {
    url: String,
    html: String,
    loaded: bool,
    extra_headers: Vec<(String, String)>,
}

pub struct HttpSurface {
    client: Client,
    user_agent: String,
    cookies: Mutex<Vec<Cookie>>,
    state: Mutex<PageState>,
}

impl HttpSurface {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            user_agent: random_user_agent().to_string(),
            cookies: Mutex::new(Vec::new()),
            state: Mutex::new(PageState::default()),
        })
    }

    pub fn add_cookies(&self, cookies: Vec<Cookie>) {
        lock(&self.cookies).extend(cookies);
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn headers_for(&self, url: &Url) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&self.user_agent) {
            h.insert(USER_AGENT, v);
        }
        h.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,vi;q=0.8"));

        let now = Utc::now().timestamp() as f64;
        if let Some(c) = cookie_header(&lock(&self.cookies), url, now) {
            if let Ok(v) = HeaderValue::from_str(&c) {
                h.insert(COOKIE, v);
            }
        }
        for (k, v) in lock(&self.state).extra_headers.iter() {
            if let (Ok(name), Ok(val)) = (HeaderName::try_from(k.as_str()), HeaderValue::from_str(v)) {
                h.insert(name, val);
            }
        }
        h
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<(), SurfaceError> {
        let parsed = Url::parse(url).map_err(|e| SurfaceError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let req = self
            .client
            .get(parsed.clone())
            .headers(self.headers_for(&parsed))
            .timeout(timeout);

        let timeout_err = || SurfaceError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };
        let nav_err = |e: reqwest::Error| {
            if e.is_timeout() {
                timeout_err()
            } else {
                SurfaceError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let rsp = req.send().await.map_err(nav_err)?;
        let status = rsp.status();
        let final_url = rsp.url().to_string();
        let body = rsp.text().await.map_err(nav_err)?;
        debug!(target: "surface", url = %final_url, status = status.as_u16(), bytes = body.len(), "fetched");

        {
            let mut st = lock(&self.state);
            st.url = final_url;
            st.html = body;
            st.loaded = true;
        }

        // Body is kept either way so challenge pages stay inspectable.
        if !status.is_success() {
            return Err(SurfaceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn html(&self) -> Result<String, SurfaceError> {
        let st = lock(&self.state);
        if !st.loaded {
            return Err(SurfaceError::NoPage);
        }
        Ok(st.html.clone())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

#[async_trait]
impl Surface for HttpSurface {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), SurfaceError> {
        self.fetch(url, timeout).await
    }

    async fn current_url(&self) -> String {
        lock(&self.state).url.clone()
    }

    async fn title(&self) -> String {
        self.html().map(|h| document_title(&h)).unwrap_or_default()
    }

    async fn frames(&self) -> Vec<FrameInfo> {
        self.html().map(|h| document_frames(&h)).unwrap_or_default()
    }

    async fn query(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, SurfaceError> {
        let html = self.html()?;
        Ok(select_document(&html, selector, &None)?
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Element>)
            .collect())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<(), SurfaceError> {
        // Static DOM: either it is there now or it never will be.
        if self.query(selector).await?.is_empty() {
            return Err(SurfaceError::NotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn settle(&self, timeout: Duration) -> Result<(), SurfaceError> {
        let url = lock(&self.state).url.clone();
        if url.is_empty() {
            return Err(SurfaceError::NoPage);
        }
        self.fetch(&url, timeout).await
    }

    async fn set_extra_headers(&self, headers: Vec<(String, String)>) {
        lock(&self.state).extra_headers = headers;
    }

    async fn viewport(&self) -> Option<Viewport> {
        None
    }

    async fn mouse_move(&self, _x: f64, _y: f64) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn wheel(&self, _delta_x: f64, _delta_y: f64) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<PathBuf, SurfaceError> {
        let html = self.html()?;
        let out = path.with_extension("html");
        if let Some(dir) = out.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&out, html).await?;
        Ok(out)
    }
}
