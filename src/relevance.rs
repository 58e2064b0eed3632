// src/relevance.rs
//! Relevance gate for postings: config schema, regex compilation, admission and scoring.
//!
//! Admission (`should_include`) is a conjunction of four checks over the folded
//! title + description: inclusion pattern hit, no exclusion hit, no experience veto,
//! recent posted date. The score (`calculate_match_score`) is additive in `[0, 10]`
//! with the experience veto forcing 0.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::posting::{fold_text, Posting};
use crate::recency::{is_recent_at, RecencyWindow};

pub const MAX_SCORE: u8 = 10;

const POINTS_KEYWORD: u8 = 3;
const POINTS_LEVEL: u8 = 3;
const POINTS_PRIMARY_LOCATION: u8 = 2;
const POINTS_SECONDARY_LOCATION: u8 = 1;
const POINTS_TECH_STACK: u8 = 1;

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Role/technology terms a posting must mention.
    pub include_pattern: String,
    /// Seniority terms and explicit high-experience phrasing.
    pub exclude_pattern: String,
    /// Entry-level terms worth points.
    pub level_pattern: String,
    /// Stack terms worth a bonus point.
    pub tech_stack_pattern: String,
    /// Years-of-experience phrase; must contain a named group `years`.
    pub experience_pattern: String,
    /// A `years` capture at or above this vetoes the posting.
    pub max_years_experience: u32,
    pub primary_locations: Vec<String>,
    pub secondary_locations: Vec<String>,
    pub recency: RecencyWindow,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            include_pattern: r"(?i)\b(golang|go\s+(developer|backend|engineer)|go|blockchain)\b".into(),
            exclude_pattern: r"(?i)\b(senior|lead|manager|principal|staff|architect|(\d{2,}|[3-9])\s*(\+|plus)?\s*years?|2\+\s*years?)\b".into(),
            level_pattern: r"(?i)\b(fresher|intern|internship|junior|entry[\s-]?level|graduate|trainee)\b".into(),
            tech_stack_pattern: r"(?i)\b(docker|kubernetes|k8s|aws|gcp|azure|microservices?|rest\s*api|grpc|backend|back-end|fullstack|full-stack)\b".into(),
            experience_pattern: r"(?i)\b(?P<years>\d{1,2})\s*(\+|plus)?\s*(nam|years?|yoe|yrs?)\b".into(),
            max_years_experience: 3,
            primary_locations: [
                "can tho", "remote", "tu xa", "ho chi minh", "hcm", "saigon", "sai gon", "tphcm",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            secondary_locations: ["ha noi", "hanoi", "da nang", "worldwide", "global"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            recency: RecencyWindow::default(),
        }
    }
}

/* ----------------------------
Compiled rules
---------------------------- */

/// Immutable, compiled form of `RelevanceConfig`. Build once, share by reference.
#[derive(Debug)]
pub struct RelevanceRules {
    include: Regex,
    exclude: Regex,
    level: Regex,
    tech_stack: Regex,
    experience: Regex,
    max_years_experience: u32,
    primary_locations: Vec<String>,
    secondary_locations: Vec<String>,
    recency: RecencyWindow,
}

/// Admission + score with the reasons behind them (for debug logs and tests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub included: bool,
    pub score: u8,
    pub reasons: Vec<String>,
}

fn compile(field: &str, pattern: &str) -> anyhow::Result<Regex> {
    Regex::new(pattern).map_err(|e| anyhow::anyhow!("relevance `{field}` regex error: {e}"))
}

fn fold_list(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let f = fold_text(it.trim());
        if !f.is_empty() && !out.contains(&f) {
            out.push(f);
        }
    }
    out
}

impl RelevanceRules {
    pub fn compile(cfg: &RelevanceConfig) -> anyhow::Result<Self> {
        let experience = compile("experience_pattern", &cfg.experience_pattern)?;
        if !experience.capture_names().any(|n| n == Some("years")) {
            anyhow::bail!("relevance `experience_pattern` needs a named group `years`");
        }
        Ok(Self {
            include: compile("include_pattern", &cfg.include_pattern)?,
            exclude: compile("exclude_pattern", &cfg.exclude_pattern)?,
            level: compile("level_pattern", &cfg.level_pattern)?,
            tech_stack: compile("tech_stack_pattern", &cfg.tech_stack_pattern)?,
            experience,
            max_years_experience: cfg.max_years_experience,
            primary_locations: fold_list(&cfg.primary_locations),
            secondary_locations: fold_list(&cfg.secondary_locations),
            recency: cfg.recency,
        })
    }

    /// Build from a TOML snippet holding the fields of `RelevanceConfig` at top level.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: RelevanceConfig = toml::from_str(toml_str)?;
        Self::compile(&cfg)
    }

    /// True if any "N years" phrase reaches the threshold.
    pub fn experience_veto(&self, folded: &str) -> bool {
        self.experience.captures_iter(folded).any(|caps| {
            caps.name("years")
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .is_some_and(|y| y >= self.max_years_experience)
        })
    }

    fn location_points(&self, location: &str) -> u8 {
        let loc = fold_text(location);
        if loc.is_empty() {
            return 0;
        }
        if self.primary_locations.iter().any(|l| loc.contains(l.as_str())) {
            POINTS_PRIMARY_LOCATION
        } else if self.secondary_locations.iter().any(|l| loc.contains(l.as_str())) {
            POINTS_SECONDARY_LOCATION
        } else {
            0
        }
    }

    pub fn should_include(&self, p: &Posting) -> bool {
        self.should_include_at(p, Utc::now())
    }

    pub fn should_include_at(&self, p: &Posting, now: DateTime<Utc>) -> bool {
        self.assess_at(p, now).included
    }

    pub fn calculate_match_score(&self, p: &Posting) -> u8 {
        self.score_with_reasons(p, &mut Vec::new())
    }

    fn score_with_reasons(&self, p: &Posting, reasons: &mut Vec<String>) -> u8 {
        let text = fold_text(&p.scoring_text());
        let mut score: u8 = 0;

        if self.include.is_match(&text) {
            score += POINTS_KEYWORD;
            reasons.push(format!("keyword:+{POINTS_KEYWORD}"));
        }
        if self.level.is_match(&text) {
            score += POINTS_LEVEL;
            reasons.push(format!("level:+{POINTS_LEVEL}"));
        }
        let loc = self.location_points(&p.location);
        if loc > 0 {
            score += loc;
            reasons.push(format!("location:+{loc}"));
        }
        if self.tech_stack.is_match(&text) {
            score += POINTS_TECH_STACK;
            reasons.push(format!("tech_stack:+{POINTS_TECH_STACK}"));
        }

        // Hard veto, not a penalty.
        if self.experience_veto(&text) {
            reasons.push("experience_veto".into());
            return 0;
        }

        score.min(MAX_SCORE)
    }

    pub fn assess_at(&self, p: &Posting, now: DateTime<Utc>) -> Assessment {
        let mut reasons = Vec::new();
        let text = fold_text(&p.admission_text());

        let included = if !self.include.is_match(&text) {
            reasons.push("reject:no_keyword".into());
            false
        } else if self.exclude.is_match(&text) {
            reasons.push("reject:excluded_term".into());
            false
        } else if self.experience_veto(&text) {
            reasons.push("reject:experience".into());
            false
        } else if !is_recent_at(&p.posted_date, now, self.recency) {
            reasons.push("reject:stale".into());
            false
        } else {
            true
        };

        let score = self.score_with_reasons(p, &mut reasons);
        Assessment {
            included,
            score,
            reasons,
        }
    }

    /// Filter, attach scores, then stable-sort by descending score.
    pub fn rank(&self, postings: Vec<Posting>) -> Vec<Posting> {
        self.rank_at(postings, Utc::now())
    }

    pub fn rank_at(&self, postings: Vec<Posting>, now: DateTime<Utc>) -> Vec<Posting> {
        let mut admitted: Vec<Posting> = postings
            .into_iter()
            .filter_map(|mut p| {
                let a = self.assess_at(&p, now);
                if !a.included {
                    debug!(target: "relevance", title = %p.title, reasons = ?a.reasons, "rejected");
                    return None;
                }
                p.match_score = Some(a.score);
                Some(p)
            })
            .collect();
        // `sort_by` is stable: ties keep discovery order.
        admitted.sort_by(|a, b| b.score().cmp(&a.score()));
        admitted
    }
}

impl Default for RelevanceRules {
    fn default() -> Self {
        Self::compile(&RelevanceConfig::default()).expect("default relevance patterns compile")
    }
}

/* ----------------------------
Tests
---------------------------- */
