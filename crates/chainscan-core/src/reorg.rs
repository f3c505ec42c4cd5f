//! Reorg guard: discards the reorg-unsafe tail of a previous scan.
//!
//! The most recent blocks of any scan may later be replaced by a chain
//! reorganization. Instead of detecting forks, every run drops the records
//! of the last `reorg_safety_blocks` blocks and scans them again.

use crate::checkpoint::CheckpointStore;
use crate::error::ScanError;
use crate::types::BlockPointer;

/// Fixed-margin truncation of recently recorded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorgGuard {
    reorg_safety_blocks: u64,
}

impl ReorgGuard {
    pub fn new(reorg_safety_blocks: u64) -> Self {
        Self {
            reorg_safety_blocks,
        }
    }

    /// First block whose records can no longer be trusted.
    pub fn resume_from(&self, last_scanned: BlockPointer) -> BlockPointer {
        last_scanned.saturating_sub(self.reorg_safety_blocks)
    }

    /// Delete the untrusted tail from `store`, returning the first deleted block.
    ///
    /// Records below `floor` are kept even when they fall inside the margin.
    pub async fn truncate<S>(
        &self,
        store: &mut S,
        floor: BlockPointer,
    ) -> Result<BlockPointer, ScanError>
    where
        S: CheckpointStore + ?Sized,
    {
        let last = store.last_scanned_block();
        let resume_from = self.resume_from(last).max(floor);
        let removed = store.delete_data(resume_from).await?;
        if removed > 0 {
            tracing::info!(
                last_scanned = last,
                resume_from,
                removed,
                "Discarded potentially forked events"
            );
        }
        Ok(resume_from)
    }
}
