//! EVM log source abstraction and fetcher.
//!
//! The `LogSource` trait is what the scanner needs from a node:
//! `eth_blockNumber`, `eth_getBlockByNumber` and `eth_getLogs`.
//! `EvmFetcher` wraps it with per-chunk block timestamp resolution.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chainscan_core::error::ProviderError;
use chainscan_core::types::{BlockPointer, BlockSummary, EventFilter, ScanWindow};

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    #[serde(rename = "data")]
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash", default)]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(rename = "removed")]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Returns the block number, `None` if it is not valid hex.
    pub fn block_number_u64(&self) -> Option<u64> {
        parse_hex_u64(&self.block_number)
    }

    /// Returns the log index, `None` if it is not valid hex or overflows `u32`.
    pub fn log_index_u32(&self) -> Option<u32> {
        parse_hex_u64(&self.log_index).and_then(|v| u32::try_from(v).ok())
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// Human-readable identity for error messages.
    pub fn reference(&self) -> String {
        format!("{}-{}-{}", self.block_number, self.tx_hash, self.log_index)
    }
}

/// What the scanner needs from a ledger node.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current chain head block number.
    async fn get_chain_head(&self) -> Result<BlockPointer, ProviderError>;

    /// Block header summary, `None` if the node does not know the block.
    async fn get_block(&self, number: BlockPointer) -> Result<Option<BlockSummary>, ProviderError>;

    /// All logs in `[from, to]` matching the filter.
    ///
    /// Oversized ranges must be reported as a transient `ProviderError`
    /// (`RangeTooLarge`, `RateLimited` or `Timeout`).
    async fn get_logs(
        &self,
        from: BlockPointer,
        to: BlockPointer,
        filter: &EventFilter,
    ) -> Result<Vec<RawLog>, ProviderError>;
}

/// Fetcher that wraps a `LogSource` and resolves block timestamps in bulk.
pub struct EvmFetcher<C> {
    client: C,
    concurrency: usize,
}

impl<C: LogSource> EvmFetcher<C> {
    pub fn new(client: C, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch the current chain head block number.
    pub async fn head_block_number(&self) -> Result<BlockPointer, ProviderError> {
        self.client.get_chain_head().await
    }

    /// Fetch all logs in `window` matching the filter.
    pub async fn logs(
        &self,
        window: ScanWindow,
        filter: &EventFilter,
    ) -> Result<Vec<RawLog>, ProviderError> {
        self.client
            .get_logs(window.start_block, window.end_block, filter)
            .await
    }

    /// Resolve the timestamp of each distinct block, at most `concurrency`
    /// lookups in flight. Every lookup finishes before this returns.
    pub async fn block_timestamps(
        &self,
        blocks: &BTreeSet<BlockPointer>,
    ) -> Result<HashMap<BlockPointer, DateTime<Utc>>, ProviderError> {
        let client = &self.client;
        stream::iter(blocks.iter().copied())
            .map(|number| async move {
                let block = client
                    .get_block(number)
                    .await?
                    .ok_or(ProviderError::BlockNotFound(number))?;
                let time = block.time().ok_or_else(|| {
                    ProviderError::Rpc(format!(
                        "block {number} has out-of-range timestamp {}",
                        block.timestamp
                    ))
                })?;
                Ok::<_, ProviderError>((number, time))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await
    }
}

/// Parse a hex-encoded quantity (with or without `0x`).
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

/// Convert an `eth_getBlockByNumber` JSON response to a `BlockSummary`.
pub fn block_from_json(v: &Value) -> Option<BlockSummary> {
    Some(BlockSummary {
        number: parse_hex_u64(v["number"].as_str()?)?,
        hash: v["hash"].as_str()?.to_string(),
        timestamp: i64::try_from(parse_hex_u64(v["timestamp"].as_str()?)?).ok()?,
    })
}
