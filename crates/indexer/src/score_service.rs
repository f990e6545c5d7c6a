//! Periodic score recomputation.
//!
//! Every tracked item is re-read from the ledger at the latest block and its
//! decay score overwritten in the score ordering. A failure for one item is
//! logged and does not stop the others.

use anyhow::{Context, Result};
use async_trait::async_trait;
use songchart_core::{Cid, ScoreParams};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::listener::LedgerReader;
use crate::scheduler::Job;
use crate::storage::Storage;

/// Outcome of one recomputation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeSummary {
    /// Items whose score was written.
    pub updated: u64,
    /// Items skipped because their state could not be read or scored.
    pub failed: u64,
}

/// Recomputes decay scores for tracked items.
pub struct ScoreEngine {
    ledger: Arc<dyn LedgerReader>,
    storage: Storage,
    params: ScoreParams,
    decimals: u8,
}

impl ScoreEngine {
    /// Create a new score engine.
    pub fn new(
        ledger: Arc<dyn LedgerReader>,
        storage: Storage,
        params: ScoreParams,
        decimals: u8,
    ) -> Self {
        Self {
            ledger,
            storage,
            params,
            decimals,
        }
    }

    /// Score constants in use.
    pub fn params(&self) -> ScoreParams {
        self.params
    }

    /// Recompute and store the score of every tracked item.
    ///
    /// Fails only when the block height or the tracked set cannot be read.
    pub async fn recompute_all_scores(&self) -> Result<RecomputeSummary> {
        let current_block = self
            .ledger
            .latest_block_height()
            .await
            .context("Failed to get latest block height")?;
        let cids = self.storage.tracked_cids().await?;

        let mut summary = RecomputeSummary::default();
        for cid in &cids {
            match self.compute_score(cid, current_block).await {
                Ok(score) => match self.storage.set_score(cid, score).await {
                    Ok(()) => summary.updated += 1,
                    Err(e) => {
                        warn!("Failed to store score for {}: {:#}", cid, e);
                        summary.failed += 1;
                    }
                },
                Err(e) => {
                    warn!("Failed to score {}: {:#}", cid, e);
                    summary.failed += 1;
                }
            }
        }

        if summary.failed > 0 {
            info!(
                "Scores recomputed at block {}: {} updated, {} failed",
                current_block, summary.updated, summary.failed
            );
        } else {
            debug!(
                "Scores recomputed at block {}: {} updated",
                current_block, summary.updated
            );
        }

        Ok(summary)
    }

    async fn compute_score(&self, cid: &Cid, current_block: u64) -> Result<f64> {
        let state = self.ledger.item_state(cid, current_block).await?;
        let upvotes = state.all_time_upvotes_value(self.decimals)?;

        Ok(self
            .params
            .score_at(upvotes, state.submitted_in_block, current_block))
    }
}

#[async_trait]
impl Job for ScoreEngine {
    async fn run(&self) -> Result<()> {
        self.recompute_all_scores().await.map(|_| ())
    }
}
