//! Protocol constants shared by the indexer and its consumers.

/// Fixed-point decimals used by the Chart contract for upvote quantities.
pub const DEFAULT_DECIMALS: u8 = 6;

/// Largest decimals value that still fits `10^decimals` in a U256.
pub const MAX_DECIMALS: u8 = 77;

/// Weight added to a trending counter for every proposal or upvote.
pub const TRENDING_WEIGHT: f64 = 1.0;

/// Length of a YouTube video id embedded in a `yt:` cid.
pub const YOUTUBE_ID_LEN: usize = 11;

/// Cid type prefix for YouTube videos.
pub const KIND_YOUTUBE: &str = "yt";

/// Cid type prefix for Decrypt articles.
pub const KIND_DECRYPT: &str = "decrypt";
