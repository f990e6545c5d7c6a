//! Types returned by the storage layer.

use serde::Serialize;
use songchart_core::ItemRecord;

/// A sorted-set member with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    /// Member name.
    pub member: String,
    /// Sort key.
    pub score: f64,
}

/// An item record joined with its current ranking score.
///
/// Serializes flat, i.e. the record's fields plus `score`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    /// Cached record.
    #[serde(flatten)]
    pub record: ItemRecord,

    /// Score from the score-ordered set (0 when not yet scored).
    pub score: f64,
}

/// Database statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Number of tracked cids.
    pub tracked_items: u64,

    /// Number of cids with a computed score.
    pub scored_items: u64,

    /// Highest fully processed block, `None` before the first event.
    pub cursor: Option<u64>,
}
