//! # Songchart Core
//!
//! Core types, constants, and the decay score for the songchart ranking cache.
//!
//! This crate holds everything that does not touch I/O, so the indexer, the
//! trending reporter, and any serving layer compute identical results.
//!
//! ## Features
//!
//! - **Content ids**: bytes32 `Cid` with type-prefix parsing (`yt:`, `decrypt:`)
//! - **Records**: `ItemState` ledger snapshots and derived `ItemRecord`s
//! - **Scoring**: versioned `ScoreParams` for the time-decaying score
//! - **Fixed point**: `format_fixed` for contract quantities

#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod score;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use error::{CoreError, Result};
pub use score::{age_in_blocks, ScoreParams, ScorePreset};
pub use types::*;

// Re-export Alloy primitives for convenience
pub use alloy_primitives::{Address, B256, U256};
