//! Sync engine: replays Chart events into storage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use songchart_core::{Cid, ItemRecord, ItemState, TRENDING_WEIGHT};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ChartEvent, EventKind, LedgerReader};
use crate::config::SyncConfig;
use crate::scheduler::Job;
use crate::storage::Storage;

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Events applied to storage.
    pub events_applied: u64,
    /// `SongProposed` events among them.
    pub proposals: u64,
    /// `SongUpvoted` events among them.
    pub upvotes: u64,
    /// Cursor when the pass started.
    pub cursor_before: Option<u64>,
    /// Cursor when the pass finished.
    ///
    /// The cursor moves once per block, after that block's last event is
    /// applied, not after every event. It always names the last fully applied
    /// block; when a pass fails mid-block, events of the next block may
    /// already be in storage and are re-applied on the following pass.
    pub cursor_after: Option<u64>,
}

/// Sync engine: polls the ledger for new Chart events and maintains item
/// records, the tracked set, proposal ordering, and trending counters.
///
/// The cursor is the highest block whose events are all applied. It moves
/// only when a block's last event lands, so a failure mid-block replays that
/// block on the next pass. Ranges without events leave it untouched.
pub struct SyncEngine {
    ledger: Arc<dyn LedgerReader>,
    storage: Storage,
    config: SyncConfig,
    decimals: u8,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        storage: Storage,
        config: SyncConfig,
        decimals: u8,
    ) -> Self {
        Self {
            ledger,
            storage,
            config,
            decimals,
        }
    }

    /// Apply every event in `(cursor, latest - confirmations]`.
    ///
    /// An error aborts the pass. Events applied before the failure stay
    /// applied along with the cursor advance for their blocks.
    pub async fn run_indexing_pass(&self) -> Result<PassSummary> {
        let cursor_before = self.storage.get_cursor().await?;
        let latest = self
            .ledger
            .latest_block_height()
            .await
            .context("Failed to get latest block height")?;
        let safe_block = latest.saturating_sub(self.config.confirmations);

        let from = cursor_before
            .map(|c| c + 1)
            .unwrap_or(0)
            .max(self.config.start_block);

        let mut summary = PassSummary {
            cursor_before,
            cursor_after: cursor_before,
            ..Default::default()
        };

        if from > safe_block {
            debug!(
                "Nothing to index: cursor={:?}, latest={}, safe={}",
                cursor_before, latest, safe_block
            );
            return Ok(summary);
        }

        debug!(
            "Indexing blocks {} to {} (latest={}, confirmations={})",
            from, safe_block, latest, self.config.confirmations
        );

        for (range_start, range_end) in block_ranges(from, safe_block, self.config.batch_size) {
            let mut events = self
                .ledger
                .events(&EventKind::ALL, range_start, range_end)
                .await
                .with_context(|| {
                    format!(
                        "Failed to fetch events for blocks {} to {}",
                        range_start, range_end
                    )
                })?;
            events.sort_by_key(ChartEvent::coordinates);

            let mut iter = events.iter().peekable();
            while let Some(event) = iter.next() {
                self.apply_event(event).await.with_context(|| {
                    format!(
                        "Failed to apply {} for {} at block {}",
                        event.kind, event.cid, event.block_number
                    )
                })?;

                summary.events_applied += 1;
                match event.kind {
                    EventKind::Proposed => summary.proposals += 1,
                    EventKind::Upvoted => summary.upvotes += 1,
                }

                let block_done = iter
                    .peek()
                    .map_or(true, |next| next.block_number != event.block_number);
                if block_done {
                    self.storage.advance_cursor(event.block_number).await?;
                    summary.cursor_after = Some(event.block_number);
                }
            }
        }

        if summary.events_applied > 0 {
            info!(
                "Indexing pass complete: {} events ({} proposals, {} upvotes), cursor {:?} -> {:?}",
                summary.events_applied,
                summary.proposals,
                summary.upvotes,
                summary.cursor_before,
                summary.cursor_after
            );
        }

        Ok(summary)
    }

    /// Re-derive the item record from ledger state at the event's block.
    async fn apply_event(&self, event: &ChartEvent) -> Result<()> {
        let record = self.fetch_record(&event.cid, event.block_number).await?;

        self.storage.put_item(&record).await?;
        self.storage.track_item(&record).await?;

        if let Some(content_type) = event.cid.kind().type_tag() {
            self.storage
                .bump_trending(content_type, &event.cid, TRENDING_WEIGHT)
                .await?;
        }

        debug!("Applied {} for {} at block {}", event.kind, event.cid, event.block_number);
        Ok(())
    }

    /// Build a record from ledger state, keeping write-once fields of an
    /// existing record.
    async fn fetch_record(&self, cid: &Cid, block_number: u64) -> Result<ItemRecord> {
        let state = self.ledger.item_state(cid, block_number).await?;

        let (state, proposal_timestamp) = match self.storage.get_item(cid).await? {
            Some(existing) => (
                ItemState {
                    submitted_in_block: existing.submitted_in_block,
                    ..state
                },
                existing.proposal_timestamp,
            ),
            None => {
                let timestamp = self
                    .ledger
                    .block_timestamp(state.submitted_in_block)
                    .await
                    .with_context(|| {
                        format!("Failed to get timestamp of block {}", state.submitted_in_block)
                    })?;
                (state, timestamp)
            }
        };

        Ok(ItemRecord::from_state(
            *cid,
            &state,
            proposal_timestamp,
            self.decimals,
        )?)
    }
}

#[async_trait]
impl Job for SyncEngine {
    async fn run(&self) -> Result<()> {
        self.run_indexing_pass().await.map(|_| ())
    }
}

/// Split `[from, to]` into inclusive sub-ranges of at most `batch_size` blocks.
fn block_ranges(from: u64, to: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let batch_size = batch_size.max(1);
    let mut ranges = Vec::new();
    let mut start = from;

    while start <= to {
        let end = start.saturating_add(batch_size - 1).min(to);
        ranges.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }

    ranges
}
