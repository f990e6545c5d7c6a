//! RPC provider wrapper for reading the Chart contract.

use alloy::eips::BlockId;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, BlockTransactionsKind, Filter, Log};
use alloy::sol;
use alloy::transports::http::{Client, Http};
use anyhow::{Context, Result};
use async_trait::async_trait;
use songchart_core::{Cid, ItemState};

use super::events::{ChartEvent, EventKind};
use super::LedgerReader;

// Read-only Chart contract bindings
sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract Chart {
        function songs(bytes32 cid) external view returns (
            uint256 submittedInBlock,
            uint256 currentUpvotes,
            uint256 allTimeUpvotes,
            uint256 numUpvoters
        );
    }
}

/// HTTP RPC provider for querying the Chart contract.
#[derive(Clone)]
pub struct RpcProvider {
    provider: RootProvider<Http<Client>>,
    contract: Chart::ChartInstance<Http<Client>, RootProvider<Http<Client>>>,
    chart_address: Address,
}

impl RpcProvider {
    /// Create a new RPC provider.
    pub async fn new(rpc_url: &str, chart_address: Address) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;

        let provider = ProviderBuilder::new().on_http(url);
        let contract = Chart::new(chart_address, provider.clone());

        Ok(Self {
            provider,
            contract,
            chart_address,
        })
    }

    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .context("Failed to get chain id")
    }

    /// Fail unless the node serves `expected` chain id.
    pub async fn ensure_chain_id(&self, expected: u64) -> Result<()> {
        let actual = self.chain_id().await?;
        if actual != expected {
            anyhow::bail!(
                "RPC node serves chain id {} but the configuration expects {}; is the Chart contract deployed on this network?",
                actual,
                expected
            );
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerReader for RpcProvider {
    async fn latest_block_height(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("Failed to get block number")
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(
                BlockNumberOrTag::Number(block_number),
                BlockTransactionsKind::Hashes,
            )
            .await
            .with_context(|| format!("Failed to fetch block {}", block_number))?
            .with_context(|| format!("Block {} not found", block_number))?;

        Ok(block.header.timestamp)
    }

    async fn item_state(&self, cid: &Cid, as_of_block: u64) -> Result<ItemState> {
        let song = self
            .contract
            .songs(*cid.as_b256())
            .block(BlockId::number(as_of_block))
            .call()
            .await
            .with_context(|| format!("Failed to read songs({}) at block {}", cid, as_of_block))?;

        let submitted_in_block = u64::try_from(song.submittedInBlock)
            .with_context(|| format!("submittedInBlock of {} does not fit u64", cid))?;

        Ok(ItemState {
            submitted_in_block,
            current_upvotes: song.currentUpvotes,
            all_time_upvotes: song.allTimeUpvotes,
            num_upvoters: song.numUpvoters,
        })
    }

    async fn events(
        &self,
        kinds: &[EventKind],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChartEvent>> {
        let signatures: Vec<_> = kinds.iter().map(EventKind::signature_hash).collect();

        let filter = Filter::new()
            .address(self.chart_address)
            .event_signature(signatures)
            .from_block(from_block)
            .to_block(to_block);

        let logs: Vec<Log> = self
            .provider
            .get_logs(&filter)
            .await
            .context("Failed to fetch logs from RPC")?;

        // Parse logs into events
        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match ChartEvent::from_log(log) {
                Ok(event) => events.push(event),
                Err(e) => {
                    // Log parsing error but continue processing other events
                    tracing::warn!("Failed to parse Chart event: {:#}", e);
                }
            }
        }

        events.sort_by_key(ChartEvent::coordinates);

        Ok(events)
    }
}
