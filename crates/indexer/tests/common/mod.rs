//! Shared fakes for integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use songchart_indexer::listener::{ChartEvent, EventKind, LedgerReader};
use songchart_indexer::metadata::{ItemMetadata, MetadataSource};
use songchart_indexer::notifier::{Notifier, TrendingDigest};
use songchart_indexer::storage::Storage;
use songchart_indexer::{Address, Cid, ItemState, U256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Unix time of block 0 on the fake chain; blocks are 15 s apart.
pub const GENESIS_TIMESTAMP: u64 = 1_570_000_000;

/// One whole upvote in 6-decimal fixed point.
pub const ONE: u64 = 1_000_000;

pub async fn setup_storage() -> (Storage, NamedTempFile) {
    let temp_db = NamedTempFile::new().unwrap();
    let storage = Storage::new_with_path(temp_db.path(), None, None)
        .await
        .unwrap();
    storage.run_migrations().await.unwrap();
    (storage, temp_db)
}

/// ------- In-memory Chart contract -------
#[derive(Default)]
struct LedgerState {
    height: u64,
    events: Vec<ChartEvent>,
    // per cid: (block, state) snapshots in block order
    history: HashMap<Cid, Vec<(u64, ItemState)>>,
    failing: HashSet<Cid>,
    next_log_index: u64,
}

#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_height(&self, height: u64) {
        self.state.lock().unwrap().height = height;
    }

    /// Emit `SongProposed` at `block` with zero upvotes.
    pub fn propose(&self, cid: Cid, block: u64) {
        let mut state = self.state.lock().unwrap();
        state.history.entry(cid).or_default().push((
            block,
            ItemState {
                submitted_in_block: block,
                ..Default::default()
            },
        ));
        push_event(&mut state, EventKind::Proposed, cid, block);
    }

    /// Emit `SongUpvoted` at `block`, adding `amount` (fixed point) to the totals.
    pub fn upvote(&self, cid: Cid, block: u64, amount: u64) {
        let mut state = self.state.lock().unwrap();
        let history = state.history.entry(cid).or_default();
        let previous = history.last().map(|(_, s)| *s).unwrap_or_default();
        history.push((
            block,
            ItemState {
                submitted_in_block: previous.submitted_in_block,
                current_upvotes: previous.current_upvotes + U256::from(amount),
                all_time_upvotes: previous.all_time_upvotes + U256::from(amount),
                num_upvoters: previous.num_upvoters + U256::from(1u64),
            },
        ));
        push_event(&mut state, EventKind::Upvoted, cid, block);
    }

    /// Make `item_state` fail for `cid` until healed.
    pub fn fail_item(&self, cid: Cid) {
        self.state.lock().unwrap().failing.insert(cid);
    }

    pub fn heal_item(&self, cid: Cid) {
        self.state.lock().unwrap().failing.remove(&cid);
    }
}

fn push_event(state: &mut LedgerState, kind: EventKind, cid: Cid, block: u64) {
    let log_index = state.next_log_index;
    state.next_log_index += 1;
    state.events.push(ChartEvent {
        kind,
        cid,
        account: Address::repeat_byte(0x01),
        block_number: block,
        tx_index: 0,
        log_index,
    });
}

#[async_trait]
impl LedgerReader for FakeLedger {
    async fn latest_block_height(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().height)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        Ok(GENESIS_TIMESTAMP + block_number * 15)
    }

    async fn item_state(&self, cid: &Cid, as_of_block: u64) -> Result<ItemState> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(cid) {
            anyhow::bail!("RPC timeout reading {}", cid);
        }

        Ok(state
            .history
            .get(cid)
            .and_then(|history| {
                history
                    .iter()
                    .rev()
                    .find(|(block, _)| *block <= as_of_block)
                    .map(|(_, s)| *s)
            })
            .unwrap_or_default())
    }

    async fn events(
        &self,
        kinds: &[EventKind],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChartEvent>> {
        let state = self.state.lock().unwrap();
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| kinds.contains(&e.kind))
            .filter(|e| e.block_number >= from_block && e.block_number <= to_block)
            .cloned()
            .collect();
        events.sort_by_key(ChartEvent::coordinates);
        Ok(events)
    }
}

/// ------- Metadata with fixed titles -------
#[derive(Default)]
pub struct FakeMetadata {
    titles: Mutex<HashMap<Cid, String>>,
}

impl FakeMetadata {
    pub fn with_title(self, cid: Cid, title: &str) -> Self {
        self.titles.lock().unwrap().insert(cid, title.to_string());
        self
    }
}

#[async_trait]
impl MetadataSource for FakeMetadata {
    async fn fetch(&self, cid: &Cid) -> Result<ItemMetadata> {
        let titles = self.titles.lock().unwrap();
        let Some(title) = titles.get(cid) else {
            anyhow::bail!("Video not found for {}", cid);
        };
        Ok(ItemMetadata {
            title: title.clone(),
            description: String::new(),
            thumbnail_url: None,
        })
    }
}

/// ------- Notifier that records what it was asked to send -------
#[derive(Default)]
pub struct RecordingNotifier {
    pub digests: Mutex<Vec<TrendingDigest>>,
    pub texts: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn digests(&self) -> Vec<TrendingDigest> {
        self.digests.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_digest(&self, digest: &TrendingDigest) -> Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("webhook returned 500");
        }
        self.digests.lock().unwrap().push(digest.clone());
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("webhook returned 500");
        }
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
