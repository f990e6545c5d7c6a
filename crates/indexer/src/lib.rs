//! Chart event indexing and scoring for songchart.
//!
//! This crate provides:
//! - Event replay from the Chart contract into a local cache
//! - Periodic decay-score recomputation for every tracked item
//! - A trending digest pushed to a Slack webhook
//! - Interval scheduling with persisted last-run timestamps
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │  songchart-indexer (this)                 │
//! │                                           │
//! │  ┌──────────────┐                         │
//! │  │ LedgerReader │ ← Ethereum RPC          │
//! │  └──┬────────┬──┘   SongProposed/Upvoted  │
//! │     │        │                            │
//! │ ┌───▼────┐ ┌─▼───────────┐                │
//! │ │  Sync  │ │ ScoreEngine │                │
//! │ │ Engine │ │  (5 s)      │                │
//! │ │ (3 s)  │ └─┬───────────┘                │
//! │ └───┬────┘   │                            │
//! │     │   ┌────▼──────┐                     │
//! │     └──►│  Storage  │ ← SQLite            │
//! │         │ map/zsets │   records, rankings │
//! │         └────┬──────┘   cursor, trending  │
//! │              │                            │
//! │     ┌────────▼─────────┐                  │
//! │     │ TrendingReporter │ → YouTube API    │
//! │     │  (daily)         │ → Slack webhook  │
//! │     └──────────────────┘                  │
//! └───────────────────────────────────────────┘
//!                │
//!                │ Shared DB
//!                ▼
//!        serving layer (separate)
//!        • ranked by score
//!        • ranked by proposal time
//! ```
//!
//! Every job runs under a [`scheduler::IntervalJob`], which logs and swallows
//! job failures so that no single job stops the others.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod listener;
pub mod metadata;
pub mod notifier;
pub mod scheduler;
pub mod score_service;
pub mod storage;
pub mod trending;

// Re-export common types
pub use songchart_core::*;
