//! Scanner configuration and state types.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::types::{EventFilter, EventKind};

/// Configuration for an event scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Upper bound on blocks per `eth_getLogs` request.
    pub max_chunk_scan_size: u64,
    /// Trailing blocks of the previous run that are discarded and re-scanned.
    pub reorg_safety_blocks: u64,
    /// Blocks kept back from the chain head when suggesting a scan end.
    pub end_block_buffer: u64,
    /// Minimum seconds between periodic checkpoint flushes (0 = every chunk).
    pub flush_interval_secs: u64,
    /// Window multiplier after a successful chunk. `1.0` keeps the size fixed.
    pub chunk_growth_factor: f64,
    /// Pause before retrying a window the provider rejected (milliseconds).
    pub retry_backoff_ms: u64,
    /// Concurrent block lookups when resolving timestamps within a chunk.
    pub timestamp_concurrency: usize,
    /// Event kinds to decode and record.
    pub event_kinds: Vec<EventKind>,
    /// Address / topic filter passed to the log source.
    pub filter: EventFilter,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_chunk_scan_size: 10_000,
            reorg_safety_blocks: 10,
            end_block_buffer: 0,
            flush_interval_secs: 60,
            chunk_growth_factor: 1.0,
            retry_backoff_ms: 500,
            timestamp_concurrency: 8,
            event_kinds: vec![EventKind::Transfer],
            filter: EventFilter::default(),
        }
    }
}

impl ScannerConfig {
    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ScanError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scan loop cannot make progress with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.max_chunk_scan_size == 0 {
            return Err(ScanError::Config("max_chunk_scan_size must be at least 1".into()));
        }
        if self.timestamp_concurrency == 0 {
            return Err(ScanError::Config("timestamp_concurrency must be at least 1".into()));
        }
        if self.event_kinds.is_empty() {
            return Err(ScanError::Config("at least one event kind is required".into()));
        }
        if self.chunk_growth_factor.is_nan() || self.chunk_growth_factor < 1.0 {
            return Err(ScanError::Config(format!(
                "chunk_growth_factor must be >= 1.0, got {}",
                self.chunk_growth_factor
            )));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Where the scanner is within one `scan` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScannerState {
    /// Not scanning.
    Idle,
    /// Discarding records inside the reorg-unsafe trailing window.
    Truncating,
    /// Computing the next block range.
    Windowing,
    /// Requesting logs for the current window.
    Fetching,
    /// Decoding logs and writing records.
    Decoding,
    /// Committing the chunk to the checkpoint.
    Checkpointing,
    /// Reached the target block (or stopped at a chunk boundary).
    Done,
    /// Aborted on an unrecoverable error.
    Failed,
}

impl std::fmt::Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Truncating => write!(f, "truncating"),
            Self::Windowing => write!(f, "windowing"),
            Self::Fetching => write!(f, "fetching"),
            Self::Decoding => write!(f, "decoding"),
            Self::Checkpointing => write!(f, "checkpointing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
