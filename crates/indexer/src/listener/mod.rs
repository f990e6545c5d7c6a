//! Ledger access and event replay for the Chart contract.
//!
//! This module provides:
//! - Event type definitions and parsing
//! - The `LedgerReader` read contract and its RPC implementation
//! - The sync engine that replays events into storage

use anyhow::Result;
use async_trait::async_trait;
use songchart_core::{Cid, ItemState};

pub mod events;
pub mod provider;
pub mod sync;

pub use events::{ChartEvent, EventKind};
pub use provider::RpcProvider;
pub use sync::{PassSummary, SyncEngine};

/// Read-only view of the ledger.
///
/// Implementations do not cache or retry; transport errors surface to the
/// calling job, which abandons its current run.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// Latest block height known to the node.
    async fn latest_block_height(&self) -> Result<u64>;

    /// Unix timestamp (seconds) of a block.
    async fn block_timestamp(&self, block_number: u64) -> Result<u64>;

    /// Contract-level state of `cid` as of `as_of_block`.
    async fn item_state(&self, cid: &Cid, as_of_block: u64) -> Result<ItemState>;

    /// Events of the given kinds in `[from_block, to_block]`, in chain order.
    async fn events(
        &self,
        kinds: &[EventKind],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChartEvent>>;
}
