// src/notify/telegram.rs
use super::{format_posting, Notifier};
use crate::posting::Posting;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";
/// Upper bound for `with_retries`; keeps the backoff shift small.
const MAX_RETRIES: u8 = 8;

#[derive(Clone)]
pub struct TelegramNotifier {
    endpoint: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl std::fmt::Debug for TelegramNotifier {
    // endpoint embeds the bot token
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{API_BASE}/bot{bot_token}/sendMessage"),
            chat_id: chat_id.into(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// Point at a different Bot API host (local bot server, tests).
    pub fn with_api_base(mut self, base: &str, bot_token: &str) -> Self {
        self.endpoint = format!("{}/bot{bot_token}/sendMessage", base.trim_end_matches('/'));
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_RETRIES);
        self
    }

    async fn send_html(&self, text: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    // without_url: the URL carries the token
                    Err(e) => anyhow!("Telegram HTTP error: {}", e.without_url()),
                },
                Err(e) => anyhow!("Telegram request failed: {}", e.without_url()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(target: "notify", attempt, error = %err, "telegram send failed, retrying");
            tokio::time::sleep(backoff(attempt)).await;
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_posting(&self, posting: &Posting) -> Result<()> {
        self.send_html(&format_posting(posting)).await
    }

    async fn send_status(&self, text: &str) -> Result<()> {
        let body = format!("ℹ️ {}", html_escape::encode_text(text));
        self.send_html(&body).await
    }
}

/// 500ms, 1s, 2s, ... for attempts 1, 2, 3, ...
fn backoff(attempt: u8) -> Duration {
    let shift = attempt.saturating_sub(1).min(MAX_RETRIES);
    Duration::from_millis(500u64 << shift)
}
