// src/screenshot.rs
//! Diagnostic page captures for blocked or unexpected pages.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::surface::Surface;

#[derive(Debug, Clone)]
pub struct ScreenshotDebugger {
    dir: PathBuf,
}

impl ScreenshotDebugger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<name>_<YYYY-MM-DD_HH-MM-SS>.png`
    pub fn path_for(&self, name: &str) -> PathBuf {
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}_{stamp}.png"))
    }

    /// Capture the current page. Failures are logged and yield `None`.
    pub async fn capture(&self, surface: &dyn Surface, name: &str) -> Option<PathBuf> {
        let path = self.path_for(name);
        match surface.screenshot(&path).await {
            Ok(written) => {
                info!(path = %written.display(), "diagnostic capture saved");
                Some(written)
            }
            Err(e) => {
                warn!(name, error = %e, "diagnostic capture failed");
                None
            }
        }
    }
}
