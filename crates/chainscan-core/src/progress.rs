//! Per-chunk progress reporting.

use chrono::{DateTime, Utc};

use crate::types::BlockPointer;

/// What the scanner reports after each committed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProgress {
    /// First block of the whole scan.
    pub overall_start: BlockPointer,
    /// Last block of the whole scan.
    pub overall_end: BlockPointer,
    /// Last block of the chunk just committed.
    pub current_block: BlockPointer,
    /// Time of the newest block that had events in this chunk, if any.
    pub current_block_timestamp: Option<DateTime<Utc>>,
    /// Blocks covered by the chunk.
    pub chunk_size: u64,
    /// Events written in the chunk.
    pub events_in_chunk: usize,
}

impl ChunkProgress {
    /// Blocks committed so far out of the whole scan.
    pub fn blocks_done(&self) -> u64 {
        self.current_block.saturating_sub(self.overall_start) + 1
    }

    pub fn blocks_total(&self) -> u64 {
        self.overall_end.saturating_sub(self.overall_start) + 1
    }
}

/// Observer for chunk progress. Implemented for any `FnMut(&ChunkProgress)`.
pub trait ProgressReporter: Send {
    fn on_chunk(&mut self, progress: &ChunkProgress);
}

impl<F> ProgressReporter for F
where
    F: FnMut(&ChunkProgress) + Send,
{
    fn on_chunk(&mut self, progress: &ChunkProgress) {
        self(progress)
    }
}

/// A reporter that ignores progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn on_chunk(&mut self, _progress: &ChunkProgress) {}
}
