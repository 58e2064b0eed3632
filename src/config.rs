// src/config.rs
//! Run configuration: one TOML file plus a few environment overrides.
//!
//! Resolution:
//! 1) $JOB_SCOUT_CONFIG (must exist)
//! 2) config/job_scout.toml
//! 3) built-in defaults
//!
//! Then `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `JOB_SCOUT_CACHE_DIR` and
//! `JOB_SCOUT_LOGS_DIR` override the file.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::evasion::StealthProfile;
use crate::pipeline::SourceErrorPolicy;
use crate::relevance::{RelevanceConfig, RelevanceRules};
use crate::scrape::SourceKind;

pub const ENV_CONFIG_PATH: &str = "JOB_SCOUT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/job_scout.toml";

const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
const ENV_CACHE_DIR: &str = "JOB_SCOUT_CACHE_DIR";
const ENV_LOGS_DIR: &str = "JOB_SCOUT_LOGS_DIR";

/// What to search for and where.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    /// Dropped when found in a card's title or company.
    pub exclude_keywords: Vec<String>,
    /// Source names, see `SourceKind`.
    pub sources: Vec<String>,
    /// Copied from `[paths]`; cookie files are `cookies-<source>.json` in here.
    #[serde(skip)]
    pub cookies_dir: PathBuf,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["golang".into()],
            locations: vec!["Ho Chi Minh".into(), "Can Tho".into()],
            exclude_keywords: Vec::new(),
            sources: SourceKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            cookies_dir: PathBuf::from("cookies"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub cache_dir: PathBuf,
    pub cookies_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub screenshots_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
            cookies_dir: PathBuf::from("cookies"),
            logs_dir: PathBuf::from("logs"),
            screenshots_dir: PathBuf::from("screenshots"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Wall-clock budget for the whole run.
    pub timeout_secs: u64,
    pub send_delay_ms: u64,
    pub max_notifications: Option<usize>,
    pub on_source_error: SourceErrorPolicy,
    pub navigation_timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            send_delay_ms: 1000,
            max_notifications: None,
            on_source_error: SourceErrorPolicy::default(),
            navigation_timeout_ms: 30_000,
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "***"))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: ScraperConfig,
    pub paths: PathsConfig,
    pub run: RunConfig,
    pub relevance: RelevanceConfig,
    pub stealth: StealthProfile,
    pub telegram: TelegramConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing job scout config")?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Env path, then `config/job_scout.toml`, then defaults; env overrides applied last.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                let mut c = AppConfig::default();
                c.normalize();
                c
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// `--config` wins over the env var and the default file.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(p) => {
                let mut cfg = Self::load_from(p)?;
                cfg.apply_env_overrides();
                Ok(cfg)
            }
            None => Self::load_default(),
        }
    }

    pub fn apply_env_overrides(&mut self) {
        let non_empty = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty(ENV_BOT_TOKEN) {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = non_empty(ENV_CHAT_ID) {
            self.telegram.chat_id = Some(v);
        }
        if let Some(v) = non_empty(ENV_CACHE_DIR) {
            self.paths.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty(ENV_LOGS_DIR) {
            self.paths.logs_dir = PathBuf::from(v);
        }
    }

    fn normalize(&mut self) {
        self.search.keywords = clean_list(std::mem::take(&mut self.search.keywords));
        self.search.locations = clean_list(std::mem::take(&mut self.search.locations));
        self.search.exclude_keywords =
            clean_list(std::mem::take(&mut self.search.exclude_keywords));
        self.search.sources = clean_list(std::mem::take(&mut self.search.sources));
        self.search.cookies_dir = self.paths.cookies_dir.clone();
    }

    fn validate(&self) -> Result<()> {
        if self.search.keywords.is_empty() {
            bail!("search.keywords is empty");
        }
        self.source_kinds()?;
        Ok(())
    }

    /// Configured sources in order; an unknown name is an error.
    pub fn source_kinds(&self) -> Result<Vec<SourceKind>> {
        let mut out = Vec::new();
        for name in &self.search.sources {
            let kind = SourceKind::parse(name)
                .ok_or_else(|| anyhow!("unknown source `{name}` in search.sources"))?;
            if !out.contains(&kind) {
                out.push(kind);
            }
        }
        Ok(out)
    }

    pub fn relevance_rules(&self) -> Result<RelevanceRules> {
        RelevanceRules::compile(&self.relevance)
    }

    /// `(token, chat_id)` when both are set.
    pub fn telegram_credentials(&self) -> Option<(&str, &str)> {
        match (&self.telegram.bot_token, &self.telegram.chat_id) {
            (Some(t), Some(c)) if !t.trim().is_empty() && !c.trim().is_empty() => {
                Some((t.as_str(), c.as_str()))
            }
            _ => None,
        }
    }
}

/// Trim, drop blanks, drop duplicates; first occurrence keeps its place.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}
