// src/dedup.rs
//! Persistent seen-URL cache with a 30-day retention window.
//!
//! On disk: `seen_jobs.json`, a JSON array of `{ "url", "timestamp" }` (ms since epoch).
//! Expired entries are dropped on load. A missing or corrupt file is an empty cache.
//! Persistence failures are logged and swallowed; they never fail a run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SEEN_FILE: &str = "seen_jobs.json";
pub const THIRTY_DAYS_MS: i64 = 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeenEntry {
    url: String,
    timestamp: i64,
}

#[derive(Debug)]
pub struct SeenCache {
    path: PathBuf,
    inner: Mutex<HashMap<String, i64>>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl SeenCache {
    /// Load `<dir>/seen_jobs.json`, keeping entries younger than 30 days.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        Self::open_at(dir, now_ms())
    }

    /// Like `open`, with an explicit clock.
    pub fn open_at(dir: impl AsRef<Path>, now_ms: i64) -> Self {
        let dir = dir.as_ref();
        if let Err(e) = fs::create_dir_all(dir) {
            warn!(target: "dedup", dir = %dir.display(), error = %e, "cannot create cache dir");
        }
        let path = dir.join(SEEN_FILE);
        let cutoff = now_ms - THIRTY_DAYS_MS;

        let entries: Vec<SeenEntry> = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(target: "dedup", path = %path.display(), error = %e, "corrupt seen cache, starting empty");
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(target: "dedup", path = %path.display(), error = %e, "seen cache unreadable, starting empty");
                Vec::new()
            }
        };

        let total = entries.len();
        let map: HashMap<String, i64> = entries
            .into_iter()
            .filter(|e| e.timestamp > cutoff)
            .map(|e| (e.url, e.timestamp))
            .collect();
        debug!(target: "dedup", kept = map.len(), expired = total.saturating_sub(map.len()), "seen cache loaded");

        Self {
            path,
            inner: Mutex::new(map),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_seen(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Record unseen `urls` with the current time and persist once if anything was new.
    /// Already-present URLs keep their first-seen timestamp.
    pub fn add<S: AsRef<str>>(&self, urls: &[S]) {
        self.add_at(urls, now_ms());
    }

    pub fn add_at<S: AsRef<str>>(&self, urls: &[S], now_ms: i64) {
        let mut map = self.lock();
        let mut added = 0usize;
        for u in urls {
            let u = u.as_ref();
            if !map.contains_key(u) {
                map.insert(u.to_string(), now_ms);
                added += 1;
            }
        }
        if added == 0 {
            return;
        }

        let mut snapshot: Vec<SeenEntry> = map
            .iter()
            .map(|(url, ts)| SeenEntry {
                url: url.clone(),
                timestamp: *ts,
            })
            .collect();
        snapshot.sort_by(|a, b| a.url.cmp(&b.url));

        // Held through the write.
        if let Err(e) = self.persist(&snapshot) {
            warn!(target: "dedup", path = %self.path.display(), error = %e, "failed to persist seen cache");
        } else {
            debug!(target: "dedup", added, total = map.len(), "seen cache saved");
        }
    }

    fn persist(&self, entries: &[SeenEntry]) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
