//! Trending digest reporter.
//!
//! Reads the top of one content type's trending counter, resets the counter,
//! then enriches and sends a digest. The counter is cleared before any
//! network call, so a failed send loses that report and nothing else.

use anyhow::{Context, Result};
use async_trait::async_trait;
use songchart_core::{Cid, ScoreParams, KIND_YOUTUBE};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::listener::LedgerReader;
use crate::metadata::MetadataSource;
use crate::notifier::{DigestEntry, Notifier, TrendingDigest};
use crate::scheduler::Job;
use crate::storage::Storage;

/// Lead line of every digest.
pub const DEFAULT_HEADLINE: &str = ":fire: Check out what's trending on the charts today! :fire:";

/// What to report and how to present it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    /// Trending counter to consume (`yt`, `decrypt`, ...).
    pub content_type: String,
    /// Number of top items per digest.
    pub top_n: u64,
    /// Digest lead line.
    pub headline: String,
    /// Link attached to each entry.
    pub charts_url: Option<String>,
    /// Plain message sent after the digest.
    pub follow_up_message: Option<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            content_type: KIND_YOUTUBE.to_string(),
            top_n: 1,
            headline: DEFAULT_HEADLINE.to_string(),
            charts_url: None,
            follow_up_message: None,
        }
    }
}

/// Result of one report attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Counter was empty; nothing sent.
    NoItems,
    /// Digest delivered.
    Sent,
    /// Counter was consumed but the digest could not be built or delivered.
    Dropped,
}

/// Publishes trending digests.
pub struct TrendingReporter {
    ledger: Arc<dyn LedgerReader>,
    storage: Storage,
    metadata: Arc<dyn MetadataSource>,
    notifier: Arc<dyn Notifier>,
    params: ScoreParams,
    settings: ReportSettings,
}

impl TrendingReporter {
    /// Create a new reporter.
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        storage: Storage,
        metadata: Arc<dyn MetadataSource>,
        notifier: Arc<dyn Notifier>,
        params: ScoreParams,
        settings: ReportSettings,
    ) -> Self {
        Self {
            ledger,
            storage,
            metadata,
            notifier,
            params,
            settings,
        }
    }

    /// Consume the trending counter and send a digest of its top items.
    ///
    /// Only store errors before the counter is cleared are returned; failures
    /// after that are logged and reported as [`ReportOutcome::Dropped`].
    pub async fn report_trending(&self) -> Result<ReportOutcome> {
        let content_type = self.settings.content_type.as_str();

        let top = self
            .storage
            .top_trending(content_type, self.settings.top_n)
            .await?;
        if top.is_empty() {
            debug!("No trending {} items to report", content_type);
            return Ok(ReportOutcome::NoItems);
        }

        self.storage.clear_trending(content_type).await?;

        match self.deliver(&top).await {
            Ok(sent) => {
                info!("Sent trending {} digest with {} items", content_type, sent);
                Ok(ReportOutcome::Sent)
            }
            Err(e) => {
                warn!("Trending {} report dropped: {:#}", content_type, e);
                Ok(ReportOutcome::Dropped)
            }
        }
    }

    async fn deliver(&self, top: &[Cid]) -> Result<usize> {
        let current_block = self
            .ledger
            .latest_block_height()
            .await
            .context("Failed to get latest block height")?;

        let mut entries = Vec::with_capacity(top.len());
        for cid in top {
            let Some(record) = self.storage.get_item(cid).await? else {
                warn!("Trending item {} has no record, skipping", cid);
                continue;
            };

            let metadata = self
                .metadata
                .fetch(cid)
                .await
                .with_context(|| format!("Failed to fetch metadata for {}", cid))?;

            let score = self.params.score_at(
                record.all_time_upvotes_value()?,
                record.submitted_in_block,
                current_block,
            );

            entries.push(DigestEntry {
                cid: *cid,
                title: metadata.title,
                thumbnail_url: metadata.thumbnail_url,
                score,
                all_time_upvotes: record.all_time_upvotes,
                submitted_at: record.proposal_timestamp,
            });
        }

        if entries.is_empty() {
            anyhow::bail!("none of {} trending items has a record", top.len());
        }

        entries.sort_by(|a, b| b.score.total_cmp(&a.score));

        let digest = TrendingDigest {
            headline: self.settings.headline.clone(),
            link: self.settings.charts_url.clone(),
            entries,
        };
        self.notifier.send_digest(&digest).await?;

        if let Some(message) = &self.settings.follow_up_message {
            self.notifier.send_text(message).await?;
        }

        Ok(digest.entries.len())
    }
}

#[async_trait]
impl Job for TrendingReporter {
    async fn run(&self) -> Result<()> {
        self.report_trending().await.map(|_| ())
    }
}
