//! In-memory checkpoint store.
//!
//! Keeps the working state in RAM. `save()` copies it into a "durable"
//! snapshot that `restore()` reads back, so crash behaviour can be exercised
//! without touching the filesystem. Nothing survives the process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chainscan_core::checkpoint::{CheckpointStore, FlushPolicy, ScanState};
use chainscan_core::error::ScanError;
use chainscan_core::types::{BlockPointer, DecodedEvent, EventKey, EventRecord};

/// In-memory checkpoint store for tests and ephemeral scans.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: ScanState,
    durable: Option<ScanState>,
    flush: FlushPolicy,
    flushes: usize,
}

impl MemoryStore {
    pub fn new(flush: FlushPolicy) -> Self {
        Self {
            flush,
            ..Default::default()
        }
    }

    /// A store whose durable snapshot starts as `state`.
    pub fn with_durable_state(state: ScanState, flush: FlushPolicy) -> Self {
        Self {
            durable: Some(state),
            flush,
            ..Default::default()
        }
    }

    /// The last flushed snapshot, as a restarted process would see it.
    pub fn durable_state(&self) -> Option<&ScanState> {
        self.durable.as_ref()
    }

    /// Number of flushes performed (periodic and explicit).
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Simulate a crash and restart: drop the working state, keep the snapshot.
    pub fn crash(&mut self) {
        self.state = ScanState::default();
        self.flush = FlushPolicy::new(self.flush.interval());
    }

    fn flush_now(&mut self) {
        self.durable = Some(self.state.clone());
        self.flush.mark_flushed();
        self.flushes += 1;
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn restore(&mut self) {
        self.state = self.durable.clone().unwrap_or_default();
    }

    fn last_scanned_block(&self) -> BlockPointer {
        self.state.last_scanned_block
    }

    async fn start_chunk(&mut self, block_number: BlockPointer, chunk_size: u64) {
        tracing::trace!(block_number, chunk_size, "chunk started");
    }

    async fn end_chunk(&mut self, block_number: BlockPointer) -> Result<(), ScanError> {
        self.state.last_scanned_block = block_number;
        if self.flush.is_due() {
            self.flush_now();
        }
        Ok(())
    }

    async fn process_event(
        &mut self,
        block_timestamp: DateTime<Utc>,
        event: &DecodedEvent,
    ) -> Result<EventKey, ScanError> {
        self.state
            .upsert(&event.key, EventRecord::new(event, block_timestamp));
        Ok(event.key.clone())
    }

    async fn delete_data(&mut self, since_block: BlockPointer) -> Result<usize, ScanError> {
        Ok(self.state.delete_since(since_block))
    }

    async fn save(&mut self) -> Result<(), ScanError> {
        self.flush_now();
        Ok(())
    }

    fn state(&self) -> &ScanState {
        &self.state
    }
}
