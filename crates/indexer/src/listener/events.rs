//! Event type definitions for Chart contract events.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use songchart_core::Cid;
use std::fmt;

// Chart contract events, via Alloy's sol! macro
sol! {
    /// Emitted when an account proposes a new item.
    #[derive(Debug, PartialEq, Eq)]
    event SongProposed(address indexed proposer, bytes32 cid);

    /// Emitted when an account upvotes an item.
    #[derive(Debug, PartialEq, Eq)]
    event SongUpvoted(address indexed upvoter, bytes32 cid);
}

/// Kinds of Chart events the indexer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `SongProposed(proposer, cid)`
    Proposed,
    /// `SongUpvoted(upvoter, cid)`
    Upvoted,
}

impl EventKind {
    /// Every kind, in the order the indexer subscribes to them.
    pub const ALL: [EventKind; 2] = [EventKind::Proposed, EventKind::Upvoted];

    /// Topic0 of the event.
    pub fn signature_hash(&self) -> B256 {
        match self {
            EventKind::Proposed => SongProposed::SIGNATURE_HASH,
            EventKind::Upvoted => SongUpvoted::SIGNATURE_HASH,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Proposed => f.write_str("SongProposed"),
            EventKind::Upvoted => f.write_str("SongUpvoted"),
        }
    }
}

/// Parsed Chart event with block coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartEvent {
    /// Which event this is.
    pub kind: EventKind,

    /// Item the event refers to.
    pub cid: Cid,

    /// Proposer for `Proposed`, upvoter for `Upvoted`.
    pub account: Address,

    /// Block number where the event occurred
    pub block_number: u64,

    /// Transaction index within the block
    pub tx_index: u64,

    /// Log index within the block
    pub log_index: u64,
}

impl ChartEvent {
    /// Parse a Chart event from an Alloy log, dispatching on topic0.
    pub fn from_log(log: &Log) -> Result<Self> {
        let topic0 = log.topic0().copied().context("Log has no topics")?;

        let (kind, cid, account) = if topic0 == SongProposed::SIGNATURE_HASH {
            let event = SongProposed::decode_log(log.as_ref(), true)
                .context("Failed to decode SongProposed event")?;
            (EventKind::Proposed, event.data.cid, event.data.proposer)
        } else if topic0 == SongUpvoted::SIGNATURE_HASH {
            let event = SongUpvoted::decode_log(log.as_ref(), true)
                .context("Failed to decode SongUpvoted event")?;
            (EventKind::Upvoted, event.data.cid, event.data.upvoter)
        } else {
            anyhow::bail!("Unrecognized event topic {}", topic0);
        };

        let block_number = log.block_number.context("Log missing block_number")?;
        let tx_index = log
            .transaction_index
            .context("Log missing transaction_index")?;
        let log_index = log.log_index.context("Log missing log_index")?;

        Ok(Self {
            kind,
            cid: Cid::from(cid),
            account,
            block_number,
            tx_index,
            log_index,
        })
    }

    /// Ordering key: (block, transaction index, log index).
    pub fn coordinates(&self) -> (u64, u64, u64) {
        (self.block_number, self.tx_index, self.log_index)
    }
}
