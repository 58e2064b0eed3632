// src/evasion.rs
//! Stealth helpers: jittered delays, pointer/scroll noise, challenge detection.
//!
//! Everything here is best-effort. Surface errors are logged at debug level and dropped.

use std::time::Duration;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use crate::surface::{FrameInfo, Surface};

const CHALLENGE_TITLES: &[&str] = &[
    "attention required",
    "just a moment",
    "cloudflare",
    "checking your browser",
];

const CHALLENGE_FRAMES: &[&str] = &[
    "cloudflare",
    "challenges.cloudflare.com",
    "turnstile",
    "cf-chl",
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const ZERO: DelayRange = DelayRange::new(0, 0);
}

/// Timing knobs for one run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StealthProfile {
    /// After landing on a homepage / feed.
    pub warmup: DelayRange,
    /// Between navigations and clicks.
    pub action: DelayRange,
    /// Between pointer moves.
    pub micro: DelayRange,
    /// Between scroll steps.
    pub scroll: DelayRange,
    /// Between listing cards.
    pub card: DelayRange,
    pub challenge_wait_ms: u64,
    /// Wait for filters / listings to render.
    pub page_settle_ms: u64,
}

impl Default for StealthProfile {
    fn default() -> Self {
        Self {
            warmup: DelayRange::new(2000, 4000),
            action: DelayRange::new(1500, 3000),
            micro: DelayRange::new(100, 300),
            scroll: DelayRange::new(500, 1000),
            card: DelayRange::new(300, 800),
            challenge_wait_ms: 7000,
            page_settle_ms: 2000,
        }
    }
}

impl StealthProfile {
    /// No waiting at all.
    pub fn instant() -> Self {
        Self {
            warmup: DelayRange::ZERO,
            action: DelayRange::ZERO,
            micro: DelayRange::ZERO,
            scroll: DelayRange::ZERO,
            card: DelayRange::ZERO,
            challenge_wait_ms: 0,
            page_settle_ms: 0,
        }
    }
}

/// Uniform pick in `[min, max]`; `min` when the range is empty or inverted.
pub fn pick_delay_ms(min_ms: u64, max_ms: u64) -> u64 {
    if min_ms >= max_ms {
        return min_ms;
    }
    rand::rng().random_range(min_ms..=max_ms)
}

pub async fn random_delay(min_ms: u64, max_ms: u64) {
    let ms = pick_delay_ms(min_ms, max_ms);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

pub async fn random_delay_in(range: DelayRange) {
    random_delay(range.min_ms, range.max_ms).await;
}

pub async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// 3-5 pointer moves inside the viewport. No-op without a viewport.
pub async fn mouse_jiggle(surface: &dyn Surface, profile: &StealthProfile) {
    let Some(vp) = surface.viewport().await else {
        return;
    };
    let points: Vec<(f64, f64)> = {
        let mut rng = rand::rng();
        let n = rng.random_range(3..=5);
        (0..n)
            .map(|_| {
                (
                    rng.random_range(0.0..vp.width.max(1.0)),
                    rng.random_range(0.0..vp.height.max(1.0)),
                )
            })
            .collect()
    };
    for (x, y) in points {
        if let Err(e) = surface.mouse_move(x, y).await {
            debug!(target: "evasion", error = %e, "mouse move failed");
        }
        random_delay_in(profile.micro).await;
    }
}

async fn scroll_sequence(surface: &dyn Surface, profile: &StealthProfile, down: f64) {
    for dy in [down, -200.0] {
        if let Err(e) = surface.wheel(0.0, dy).await {
            debug!(target: "evasion", error = %e, "wheel failed");
        }
        random_delay_in(profile.scroll).await;
    }
    if let Err(e) = surface.scroll_to_bottom().await {
        debug!(target: "evasion", error = %e, "scroll to bottom failed");
    }
    random_delay_in(profile.scroll).await;
}

/// One larger jump down, a small correction up, then the bottom (lazy-load trigger).
pub async fn human_scroll(surface: &dyn Surface, profile: &StealthProfile) {
    let down = rand::rng().random_range(400.0..900.0);
    scroll_sequence(surface, profile, down).await;
}

/// Like `human_scroll` with a shorter first step.
pub async fn smooth_scroll(surface: &dyn Surface, profile: &StealthProfile) {
    let down = rand::rng().random_range(200.0..400.0);
    scroll_sequence(surface, profile, down).await;
}

/// Advisory: does the page look like an anti-bot interstitial?
pub fn detect_challenge(title: &str, frames: &[FrameInfo]) -> bool {
    let t = title.to_lowercase();
    if CHALLENGE_TITLES.iter().any(|m| t.contains(m)) {
        return true;
    }
    frames.iter().any(|f| {
        let url = f.url.to_lowercase();
        let name = f.name.to_lowercase();
        CHALLENGE_FRAMES
            .iter()
            .any(|m| url.contains(m) || name.contains(m))
    })
}

pub async fn page_is_challenged(surface: &dyn Surface) -> bool {
    let title = surface.title().await;
    let frames = surface.frames().await;
    detect_challenge(&title, &frames)
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::fixture::FixtureSurface;

    fn frame(url: &str, name: &str) -> FrameInfo {
        FrameInfo {
            url: url.into(),
            name: name.into(),
        }
    }

    #[test]
    fn detects_title_markers_case_insensitively() {
        assert!(detect_challenge("Just a moment...", &[]));
        assert!(detect_challenge("ATTENTION REQUIRED! | Cloudflare", &[]));
        assert!(detect_challenge("Checking your browser before accessing", &[]));
        assert!(!detect_challenge("Việc làm Golang", &[]));
    }

    #[test]
    fn detects_challenge_frames() {
        assert!(detect_challenge(
            "Jobs",
            &[frame("https://challenges.cloudflare.com/cdn-cgi/x", "")]
        ));
        assert!(detect_challenge("Jobs", &[frame("", "cf-chl-widget-abc")]));
        assert!(!detect_challenge("Jobs", &[frame("https://www.youtube.com/embed/x", "yt")]));
    }

    #[test]
    fn degenerate_range_is_fixed() {
        assert_eq!(pick_delay_ms(500, 500), 500);
        assert_eq!(pick_delay_ms(900, 100), 900);
        for _ in 0..50 {
            let v = pick_delay_ms(10, 20);
            assert!((10..=20).contains(&v));
        }
    }

    #[tokio::test]
    async fn jiggle_moves_three_to_five_times() {
        let s = FixtureSurface::new();
        mouse_jiggle(&s, &StealthProfile::instant()).await;
        assert!((3..=5).contains(&s.pointer_moves()));
    }

    #[tokio::test]
    async fn jiggle_without_viewport_is_noop() {
        let s = FixtureSurface::new().without_viewport();
        mouse_jiggle(&s, &StealthProfile::instant()).await;
        assert_eq!(s.pointer_moves(), 0);
    }

    #[tokio::test]
    async fn scroll_sequence_has_three_steps() {
        let s = FixtureSurface::new();
        human_scroll(&s, &StealthProfile::instant()).await;
        assert_eq!(s.scrolls(), 3);
    }

    #[test]
    fn user_agent_from_pool() {
        assert!(USER_AGENTS.contains(&random_user_agent()));
    }
}
