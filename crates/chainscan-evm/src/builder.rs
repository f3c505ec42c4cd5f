//! Fluent builder API for creating event scanners.
//!
//! # Example
//!
//! ```rust,no_run
//! use chainscan_evm::ScannerBuilder;
//! use chainscan_core::types::EventKind;
//!
//! let config = ScannerBuilder::new()
//!     .max_chunk_scan_size(2_000)
//!     .reorg_safety_blocks(12)
//!     .event_kinds([EventKind::Staked, EventKind::Unstaked])
//!     .address("0x25121EDDf746c884ddE4619b573A7B10714E2a36")
//!     .build_config();
//! ```

use std::path::PathBuf;

use chainscan_core::checkpoint::{CheckpointStore, FlushPolicy};
use chainscan_core::config::ScannerConfig;
use chainscan_core::error::ScanError;
use chainscan_core::types::{EventFilter, EventKind};
use chainscan_storage::JsonFileStore;

use crate::decoder::AbiEventDecoder;
use crate::fetcher::LogSource;
use crate::scanner::EventScanner;

/// Fluent builder for `ScannerConfig`.
#[derive(Debug, Default)]
pub struct ScannerBuilder {
    config: ScannerConfig,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one loaded from a file.
    pub fn from_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Set the upper bound on blocks per `eth_getLogs` request.
    pub fn max_chunk_scan_size(mut self, size: u64) -> Self {
        self.config.max_chunk_scan_size = size;
        self
    }

    /// Set how many trailing blocks are re-scanned on every run.
    pub fn reorg_safety_blocks(mut self, blocks: u64) -> Self {
        self.config.reorg_safety_blocks = blocks;
        self
    }

    /// Set how far behind the chain head a suggested scan ends.
    pub fn end_block_buffer(mut self, blocks: u64) -> Self {
        self.config.end_block_buffer = blocks;
        self
    }

    /// Set the minimum seconds between periodic flushes (0 = every chunk).
    pub fn flush_interval_secs(mut self, secs: u64) -> Self {
        self.config.flush_interval_secs = secs;
        self
    }

    pub fn chunk_growth_factor(mut self, factor: f64) -> Self {
        self.config.chunk_growth_factor = factor;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn timestamp_concurrency(mut self, n: usize) -> Self {
        self.config.timestamp_concurrency = n;
        self
    }

    /// Replace the set of event kinds to decode.
    pub fn event_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.config.event_kinds = kinds.into_iter().collect();
        self
    }

    /// Set the address/topic filter.
    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.config.filter = filter;
        self
    }

    /// Add a contract address to the filter.
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.filter.addresses.push(address.into());
        self
    }

    /// Build the `ScannerConfig`.
    pub fn build_config(self) -> ScannerConfig {
        self.config
    }

    /// Build a scanner that decodes the configured kinds into a JSON state file.
    ///
    /// The file is restored before the scanner is returned.
    pub async fn build_with_json_store<C: LogSource>(
        self,
        client: C,
        state_file: impl Into<PathBuf>,
    ) -> Result<EventScanner<C, AbiEventDecoder, JsonFileStore>, ScanError> {
        let config = self.config;
        config.validate()?;
        let mut store = JsonFileStore::new(state_file, FlushPolicy::new(config.flush_interval()));
        store.restore().await;
        let decoder = AbiEventDecoder::new(&config.event_kinds);
        EventScanner::new(config, client, decoder, store)
    }
}
