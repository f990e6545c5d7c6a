//! Core types for songchart.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{KIND_DECRYPT, KIND_YOUTUBE, MAX_DECIMALS, YOUTUBE_ID_LEN};
use crate::error::{CoreError, Result};

/// Content identifier as stored by the Chart contract (bytes32).
///
/// The bytes hold a type-prefixed UTF-8 string such as `yt:<video id>` or
/// `decrypt:<slug>`, right-padded with NUL bytes. The canonical text form used
/// as a store key is the `0x`-prefixed lowercase hex of the 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(B256);

impl Cid {
    /// Wrap raw bytes32.
    pub const fn new(bytes: B256) -> Self {
        Self(bytes)
    }

    /// Build a cid from its human-readable form, right-padding with NULs.
    ///
    /// Input longer than 32 bytes is truncated, matching how the contract
    /// receives over-long identifiers.
    pub fn from_text(text: &str) -> Self {
        let mut bytes = [0u8; 32];
        let src = text.as_bytes();
        let len = src.len().min(32);
        bytes[..len].copy_from_slice(&src[..len]);
        Self(B256::from(bytes))
    }

    /// Raw bytes32 value.
    pub const fn as_b256(&self) -> &B256 {
        &self.0
    }

    /// Decode the embedded text, keeping NUL padding.
    fn raw_text(&self) -> String {
        String::from_utf8_lossy(self.0.as_slice()).into_owned()
    }

    /// Parse the type prefix and service-specific id out of the cid.
    pub fn kind(&self) -> CidKind {
        let text = self.raw_text();
        let mut parts = text.split(':');
        let prefix = parts.next().unwrap_or_default();
        let Some(rest) = parts.next() else {
            return CidKind::Unknown;
        };

        match prefix {
            KIND_YOUTUBE => CidKind::Youtube {
                video_id: rest.chars().take(YOUTUBE_ID_LEN).collect(),
            },
            KIND_DECRYPT => CidKind::Decrypt {
                article_id: rest.split('\0').next().unwrap_or_default().to_string(),
            },
            other => CidKind::Other {
                prefix: other.to_string(),
            },
        }
    }
}

impl From<B256> for Cid {
    fn from(bytes: B256) -> Self {
        Self(bytes)
    }
}

impl From<[u8; 32]> for Cid {
    fn from(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<B256>()
            .map(Self)
            .map_err(|_| CoreError::InvalidCid(s.to_string()))
    }
}

/// Parsed content type of a cid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CidKind {
    /// `yt:<11-char video id>`
    Youtube {
        /// YouTube video id.
        video_id: String,
    },
    /// `decrypt:<article slug>`
    Decrypt {
        /// Decrypt article slug.
        article_id: String,
    },
    /// Some other `prefix:` type the indexer does not enrich.
    Other {
        /// Type prefix before the first colon.
        prefix: String,
    },
    /// No type prefix at all.
    Unknown,
}

impl CidKind {
    /// Type tag used to key trending counters, `None` for untyped cids.
    pub fn type_tag(&self) -> Option<&str> {
        match self {
            CidKind::Youtube { .. } => Some(KIND_YOUTUBE),
            CidKind::Decrypt { .. } => Some(KIND_DECRYPT),
            CidKind::Other { prefix } => Some(prefix.as_str()),
            CidKind::Unknown => None,
        }
    }
}

/// Raw per-item snapshot returned by the Chart contract's `songs(cid)` view.
///
/// Upvote quantities are fixed-point integers; see [`format_fixed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemState {
    /// Block height of the proposal transaction.
    pub submitted_in_block: u64,
    /// Current (withdrawable) upvote balance, fixed-point.
    pub current_upvotes: U256,
    /// All-time upvote total, fixed-point.
    pub all_time_upvotes: U256,
    /// Number of distinct upvoters.
    pub num_upvoters: U256,
}

impl ItemState {
    /// All-time upvotes scaled by `decimals`, as a float for scoring.
    pub fn all_time_upvotes_value(&self, decimals: u8) -> Result<f64> {
        let text = format_fixed(self.all_time_upvotes, decimals)?;
        text.parse::<f64>()
            .map_err(|_| CoreError::InvalidQuantity(text))
    }
}

/// Cached item record, derived entirely from ledger state.
///
/// Serialized as JSON into the item map; field names follow the camelCase
/// shape consumed by the serving layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    /// Content identifier.
    pub cid: Cid,
    /// Block height at proposal time.
    pub submitted_in_block: u64,
    /// Unix timestamp (seconds) of `submitted_in_block`.
    pub proposal_timestamp: u64,
    /// Current upvotes as a decimal string.
    pub current_upvotes: String,
    /// All-time upvotes as a decimal string.
    pub all_time_upvotes: String,
    /// Distinct upvoter count as a decimal string.
    pub num_upvoters: String,
}

impl ItemRecord {
    /// Derive a record from a ledger snapshot.
    pub fn from_state(
        cid: Cid,
        state: &ItemState,
        proposal_timestamp: u64,
        decimals: u8,
    ) -> Result<Self> {
        Ok(Self {
            cid,
            submitted_in_block: state.submitted_in_block,
            proposal_timestamp,
            current_upvotes: format_fixed(state.current_upvotes, decimals)?,
            all_time_upvotes: format_fixed(state.all_time_upvotes, decimals)?,
            num_upvoters: state.num_upvoters.to_string(),
        })
    }

    /// All-time upvotes as a float for scoring.
    pub fn all_time_upvotes_value(&self) -> Result<f64> {
        self.all_time_upvotes
            .parse::<f64>()
            .map_err(|_| CoreError::InvalidQuantity(self.all_time_upvotes.clone()))
    }
}

/// Render a fixed-point integer as a decimal string.
///
/// Trailing fractional zeros are dropped, so `5_000000` with 6 decimals
/// renders as `"5"` and `1_500000` as `"1.5"`.
pub fn format_fixed(raw: U256, decimals: u8) -> Result<String> {
    if decimals > MAX_DECIMALS {
        return Err(CoreError::InvalidDecimals(decimals));
    }
    if decimals == 0 {
        return Ok(raw.to_string());
    }

    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = raw / scale;
    let frac = raw % scale;
    if frac.is_zero() {
        return Ok(whole.to_string());
    }

    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    Ok(format!("{}.{}", whole, frac.trim_end_matches('0')))
}
