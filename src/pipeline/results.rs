// src/pipeline/results.rs
//! Daily result snapshot: `<dir>/job-search-<YYYY-MM-DD>.json` (UTC date), rewritten each run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::posting::Posting;

pub fn snapshot_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("job-search-{}.json", date.format("%Y-%m-%d")))
}

pub fn write_snapshot(dir: &Path, postings: &[Posting], date: NaiveDate) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating results dir {}", dir.display()))?;
    let path = snapshot_path(dir, date);
    let body = serde_json::to_string_pretty(postings).context("serializing postings")?;
    fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_named_array_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let p = write_snapshot(&dir.path().join("logs"), &[], date).unwrap();
        assert!(p.ends_with("job-search-2026-03-01.json"));
        assert_eq!(fs::read_to_string(p).unwrap(), "[]");
    }
}
