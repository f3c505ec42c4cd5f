//! Checkpoint store: the scanner's resumable record of progress and events.
//!
//! The store holds the last fully scanned block and every recorded event,
//! keyed by block → transaction → log index. A single event key maps to at
//! most one record; writing the same key twice overwrites it.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::types::{BlockPointer, DecodedEvent, EventKey, EventKind, EventRecord, ScannedEvent};

/// Records of one block: transaction hash → log index → record.
pub type BlockEvents = BTreeMap<String, BTreeMap<u32, EventRecord>>;

/// Trait for the scanner's checkpoint store.
///
/// Implementations include `JsonFileStore` and `MemoryStore`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load persisted state. Missing or unreadable state yields an empty store.
    async fn restore(&mut self);

    /// The last block whose chunk was fully processed.
    fn last_scanned_block(&self) -> BlockPointer;

    /// Called before a chunk is processed.
    async fn start_chunk(&mut self, block_number: BlockPointer, chunk_size: u64);

    /// Commit a processed chunk ending at `block_number`. Flushes when due.
    async fn end_chunk(&mut self, block_number: BlockPointer) -> Result<(), ScanError>;

    /// Upsert a decoded event and return its key.
    async fn process_event(
        &mut self,
        block_timestamp: DateTime<Utc>,
        event: &DecodedEvent,
    ) -> Result<EventKey, ScanError>;

    /// Remove every record at or above `since_block`. Returns how many were removed.
    async fn delete_data(&mut self, since_block: BlockPointer) -> Result<usize, ScanError>;

    /// Durably write the whole state.
    async fn save(&mut self) -> Result<(), ScanError>;

    /// Read access to the in-memory state.
    fn state(&self) -> &ScanState;
}

// ─── ScanState ────────────────────────────────────────────────────────────────

/// The persisted record: checkpoint plus nested event map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    pub last_scanned_block: BlockPointer,
    #[serde(default)]
    pub blocks: BTreeMap<BlockPointer, BlockEvents>,
}

impl ScanState {
    /// Insert or overwrite the record for `key`.
    pub fn upsert(&mut self, key: &EventKey, record: EventRecord) {
        self.blocks
            .entry(key.block_number)
            .or_default()
            .entry(key.tx_hash.clone())
            .or_default()
            .insert(key.log_index, record);
    }

    pub fn get(&self, key: &EventKey) -> Option<&EventRecord> {
        self.blocks
            .get(&key.block_number)?
            .get(&key.tx_hash)?
            .get(&key.log_index)
    }

    /// Drop all blocks `>= since_block`, returning the number of records removed.
    pub fn delete_since(&mut self, since_block: BlockPointer) -> usize {
        let removed = self.blocks.split_off(&since_block);
        removed.values().map(count_block_events).sum()
    }

    pub fn event_count(&self) -> usize {
        self.blocks.values().map(count_block_events).sum()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of records per event kind.
    pub fn count_by_kind(&self) -> BTreeMap<EventKind, usize> {
        let mut counts = BTreeMap::new();
        for event in self.records() {
            *counts.entry(event.record.payload.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// All records in `(block, tx_hash, log_index)` order.
    pub fn records(&self) -> impl Iterator<Item = ScannedEvent> + '_ {
        self.blocks.iter().flat_map(|(block, txs)| {
            txs.iter().flat_map(move |(tx_hash, logs)| {
                logs.iter().map(move |(log_index, record)| ScannedEvent {
                    key: EventKey::new(*block, tx_hash.clone(), *log_index),
                    record: record.clone(),
                })
            })
        })
    }
}

fn count_block_events(block: &BlockEvents) -> usize {
    block.values().map(BTreeMap::len).sum()
}

// ─── FlushPolicy ──────────────────────────────────────────────────────────────

/// Time-based flush schedule for `end_chunk`.
///
/// The first check after construction is always due, so a fresh process
/// persists its first committed chunk immediately.
#[derive(Debug, Clone)]
pub struct FlushPolicy {
    interval: Duration,
    last_flush: Option<Instant>,
}

impl FlushPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_flush: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self) -> bool {
        match self.last_flush {
            Some(at) => at.elapsed() >= self.interval,
            None => true,
        }
    }

    pub fn mark_flushed(&mut self) {
        self.last_flush = Some(Instant::now());
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
