//! Outbound digest notifications.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde_json::{json, Value};
use songchart_core::Cid;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// One item in a trending digest.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    /// Item id.
    pub cid: Cid,
    /// Display title.
    pub title: String,
    /// Preview image.
    pub thumbnail_url: Option<String>,
    /// Score at report time.
    pub score: f64,
    /// All-time upvotes as a decimal string.
    pub all_time_upvotes: String,
    /// Proposal unix timestamp (seconds).
    pub submitted_at: u64,
}

/// Formatted trending digest, entries sorted by score descending.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingDigest {
    /// Lead line of the message.
    pub headline: String,
    /// Link attached to each entry title.
    pub link: Option<String>,
    /// Items, best first.
    pub entries: Vec<DigestEntry>,
}

/// Notification channel for trending digests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a digest.
    async fn send_digest(&self, digest: &TrendingDigest) -> Result<()>;

    /// Deliver a plain text message.
    async fn send_text(&self, text: &str) -> Result<()>;
}

/// Slack incoming webhook.
#[derive(Clone)]
pub struct SlackWebhook {
    client: Client,
    url: String,
}

impl SlackWebhook {
    /// Build a webhook client for `url`.
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent("songchart-indexer/notifier")
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self { client, url })
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        self.client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .context("Failed to reach Slack webhook")?
            .error_for_status()
            .context("Slack webhook rejected message")?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SlackWebhook {
    async fn send_digest(&self, digest: &TrendingDigest) -> Result<()> {
        self.post(&slack_payload(digest)).await
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.post(&json!({ "text": text })).await
    }
}

/// Render a digest as a Slack message with one attachment per entry.
pub fn slack_payload(digest: &TrendingDigest) -> Value {
    let attachments: Vec<Value> = digest
        .entries
        .iter()
        .map(|entry| {
            json!({
                "fallback": entry.title,
                "title": entry.title,
                "title_link": digest.link,
                "image_url": entry.thumbnail_url,
                "fields": [
                    { "title": "Score", "value": format!("{:.2}", entry.score), "short": true },
                    { "title": "Upvotes", "value": entry.all_time_upvotes, "short": true },
                    { "title": "Submitted", "value": format_date(entry.submitted_at), "short": true },
                ],
            })
        })
        .collect();

    json!({
        "text": digest.headline,
        "attachments": attachments,
    })
}

// e.g. "Wed Oct 02 2019", UTC
fn format_date(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%a %b %d %Y").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
