// src/notify/mod.rs
//! Where admitted, unseen postings go.

pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::info;

use crate::posting::Posting;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_posting(&self, posting: &Posting) -> Result<()>;
    async fn send_status(&self, text: &str) -> Result<()>;
}

/// Telegram-flavoured HTML card for one posting. All fields are escaped.
pub fn format_posting(p: &Posting) -> String {
    let mut lines = vec![
        format!("🔥 <b>{}</b>", encode_text(&p.title)),
        format!("🏢 {}", encode_text(or_dash(&p.company))),
        format!("💰 {}", encode_text(or_dash(&p.salary))),
        format!("📍 {}", encode_text(or_dash(&p.location))),
    ];
    if !p.tech_stack.is_empty() {
        lines.push(format!("🛠 {}", encode_text(&p.tech_stack)));
    }
    if !p.posted_date.is_empty() {
        lines.push(format!("🗓 {}", encode_text(&p.posted_date)));
    }
    if let Some(score) = p.match_score {
        lines.push(format!("⭐ {score}/10 · {}", encode_text(&p.source)));
    } else {
        lines.push(format!("📰 {}", encode_text(&p.source)));
    }
    lines.push(format!(
        "🔗 <a href=\"{}\">Apply Now</a>",
        encode_double_quoted_attribute(&p.url)
    ));
    lines.join("\n")
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_posting(&self, p: &Posting) -> Result<()> {
        info!(target: "notify", title = %p.title, company = %p.company, score = p.score(), url = %p.url, "posting");
        Ok(())
    }

    async fn send_status(&self, text: &str) -> Result<()> {
        info!(target: "notify", status = %text, "status");
        Ok(())
    }
}
