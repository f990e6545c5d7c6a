//! Item records, rankings, and trending counters.
//!
//! Layout (logical keys):
//! - `songs:map` hash of cid -> [`ItemRecord`] JSON
//! - `songs:cids` set of tracked cids
//! - `songs:list:by-score` sorted set, decay score
//! - `songs:list:by-proposal-timestamp` sorted set, proposal unix seconds
//! - `songs:trending:<type>` sorted set, trending counter per content type

use super::{RankedItem, Storage};
use anyhow::{Context, Result};
use songchart_core::{Cid, ItemRecord};
use tracing::{info, warn};

/// Store key names.
pub mod keys {
    /// Item record map.
    pub const ITEMS: &str = "songs:map";
    /// Tracked cid set.
    pub const TRACKED: &str = "songs:cids";
    /// Score-ordered set.
    pub const BY_SCORE: &str = "songs:list:by-score";
    /// Proposal-time-ordered set.
    pub const BY_PROPOSAL_TIMESTAMP: &str = "songs:list:by-proposal-timestamp";
    /// Indexer cursor scalar.
    pub const CURSOR: &str = "songs:block-cursor";
    /// Prefix of per-type trending counters.
    pub const TRENDING_PREFIX: &str = "songs:trending:";
    /// YouTube metadata cache.
    pub const YOUTUBE_METADATA: &str = "youtube-videos";
    /// Decrypt article metadata cache.
    pub const DECRYPT_METADATA: &str = "decrypt-articles";

    /// Trending counter key for a content type.
    pub fn trending(content_type: &str) -> String {
        format!("{}{}", TRENDING_PREFIX, content_type)
    }

    /// Last-run scalar key for a scheduled job.
    pub fn job_last_run(job: &str) -> String {
        format!("songs:worker:{}:last-run", job)
    }
}

impl Storage {
    /// Write an item record, replacing any previous one for the same cid.
    pub async fn put_item(&self, record: &ItemRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize item record")?;
        self.hset(keys::ITEMS, &record.cid.to_string(), &json).await
    }

    /// Read an item record.
    pub async fn get_item(&self, cid: &Cid) -> Result<Option<ItemRecord>> {
        let Some(json) = self.hget(keys::ITEMS, &cid.to_string()).await? else {
            return Ok(None);
        };

        let record = serde_json::from_str(&json)
            .with_context(|| format!("Corrupt item record for {}", cid))?;
        Ok(Some(record))
    }

    /// Add a cid to the tracked set and the proposal-time ordering.
    pub async fn track_item(&self, record: &ItemRecord) -> Result<()> {
        let member = record.cid.to_string();
        self.sadd(keys::TRACKED, &member).await?;
        self.zadd(
            keys::BY_PROPOSAL_TIMESTAMP,
            &member,
            record.proposal_timestamp as f64,
        )
        .await
    }

    /// All tracked cids. Members that do not parse as a cid are skipped.
    pub async fn tracked_cids(&self) -> Result<Vec<Cid>> {
        let members = self.smembers(keys::TRACKED).await?;

        Ok(members
            .into_iter()
            .filter_map(|member| match member.parse::<Cid>() {
                Ok(cid) => Some(cid),
                Err(e) => {
                    warn!("Skipping malformed tracked cid {}: {}", member, e);
                    None
                }
            })
            .collect())
    }

    /// Replace an item's ranking score.
    pub async fn set_score(&self, cid: &Cid, score: f64) -> Result<()> {
        self.zadd(keys::BY_SCORE, &cid.to_string(), score).await
    }

    /// Current ranking score of an item.
    pub async fn get_score(&self, cid: &Cid) -> Result<Option<f64>> {
        self.zscore(keys::BY_SCORE, &cid.to_string()).await
    }

    /// Bump the trending counter of `content_type` for `cid`.
    pub async fn bump_trending(&self, content_type: &str, cid: &Cid, weight: f64) -> Result<f64> {
        self.zincrby(&keys::trending(content_type), &cid.to_string(), weight)
            .await
    }

    /// Top `count` cids of a trending counter, highest first.
    pub async fn top_trending(&self, content_type: &str, count: u64) -> Result<Vec<Cid>> {
        let top = self
            .zrevrange(&keys::trending(content_type), 0, count)
            .await?;

        top.into_iter()
            .map(|entry| {
                entry
                    .member
                    .parse::<Cid>()
                    .with_context(|| format!("Malformed trending member {}", entry.member))
            })
            .collect()
    }

    /// Reset a trending counter.
    pub async fn clear_trending(&self, content_type: &str) -> Result<()> {
        self.del(&keys::trending(content_type)).await?;
        Ok(())
    }

    /// Items ordered by score, highest first.
    pub async fn leaderboard(&self, offset: u64, limit: u64) -> Result<Vec<RankedItem>> {
        let entries = self.zrevrange(keys::BY_SCORE, offset, limit).await?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let cid = match entry.member.parse::<Cid>() {
                Ok(cid) => cid,
                Err(e) => {
                    warn!("Skipping malformed scored cid {}: {}", entry.member, e);
                    continue;
                }
            };
            match self.get_item(&cid).await? {
                Some(record) => items.push(RankedItem {
                    record,
                    score: entry.score,
                }),
                None => warn!("Scored cid {} has no item record", cid),
            }
        }

        Ok(items)
    }

    /// Items ordered by proposal time, newest first (oldest first if `reverse`).
    ///
    /// Each item carries its current score, or 0 if not yet scored.
    pub async fn items_by_proposal_time(
        &self,
        offset: u64,
        limit: u64,
        reverse: bool,
    ) -> Result<Vec<RankedItem>> {
        let entries = if reverse {
            self.zrange(keys::BY_PROPOSAL_TIMESTAMP, offset, limit)
                .await?
        } else {
            self.zrevrange(keys::BY_PROPOSAL_TIMESTAMP, offset, limit)
                .await?
        };

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let cid = match entry.member.parse::<Cid>() {
                Ok(cid) => cid,
                Err(e) => {
                    warn!("Skipping malformed cid {}: {}", entry.member, e);
                    continue;
                }
            };
            let Some(record) = self.get_item(&cid).await? else {
                warn!("Proposal-ordered cid {} has no item record", cid);
                continue;
            };
            let score = self.get_score(&cid).await?.unwrap_or(0.0);
            items.push(RankedItem { record, score });
        }

        Ok(items)
    }

    /// Wipe all derived state: records, rankings, cursor, trending counters,
    /// and metadata caches. The next indexing pass replays from genesis.
    pub async fn clear_all(&self) -> Result<()> {
        info!("Clearing all derived state");

        for key in [
            keys::BY_SCORE,
            keys::BY_PROPOSAL_TIMESTAMP,
            keys::ITEMS,
            keys::CURSOR,
            keys::TRACKED,
            keys::YOUTUBE_METADATA,
            keys::DECRYPT_METADATA,
        ] {
            self.del(key).await?;
        }
        // Counters exist for every typed prefix seen on chain
        self.del_prefix(keys::TRENDING_PREFIX).await?;

        Ok(())
    }
}
