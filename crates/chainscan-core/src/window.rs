//! Scan window planning.
//!
//! Pure policy for choosing which block range to request next. Windows are
//! contiguous: every window starts one block after the previous one ended.
//! A window shrinks when the provider rejects it and never exceeds
//! `max_chunk_scan_size`.

use crate::types::{BlockPointer, ScanWindow};

/// Computes scan windows from a chunk-size ceiling and an optional growth factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPlanner {
    max_chunk_scan_size: u64,
    growth_factor: f64,
}

impl WindowPlanner {
    /// A planner with fixed window size. `max_chunk_scan_size` is clamped to at least 1.
    pub fn new(max_chunk_scan_size: u64) -> Self {
        Self {
            max_chunk_scan_size: max_chunk_scan_size.max(1),
            growth_factor: 1.0,
        }
    }

    /// Grow the window by `factor` after every successful chunk (capped at the max).
    pub fn with_growth(mut self, factor: f64) -> Self {
        self.growth_factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    pub fn max_chunk_scan_size(&self) -> u64 {
        self.max_chunk_scan_size
    }

    /// The first window of a resumed scan: back off `safety_margin` blocks
    /// from the checkpoint and stop at the chain head.
    pub fn resume_window(
        &self,
        last_scanned: BlockPointer,
        safety_margin: u64,
        chain_head: BlockPointer,
    ) -> Option<ScanWindow> {
        self.first(last_scanned.saturating_sub(safety_margin), chain_head)
    }

    /// The first window of a scan over `[start, target_end]`.
    pub fn first(&self, start: BlockPointer, target_end: BlockPointer) -> Option<ScanWindow> {
        self.sized(start, self.max_chunk_scan_size, target_end)
    }

    /// The window following `previous`, keeping its size unless growth is enabled.
    pub fn next(&self, previous: ScanWindow, target_end: BlockPointer) -> Option<ScanWindow> {
        let start = previous.end_block.checked_add(1)?;
        self.sized(start, self.grow(previous.size()), target_end)
    }

    /// Halve `window` keeping its start. `None` once it is a single block.
    pub fn shrink(&self, window: ScanWindow) -> Option<ScanWindow> {
        let size = window.size();
        if size <= 1 {
            return None;
        }
        let new_size = (size / 2).max(1);
        Some(ScanWindow::new(
            window.start_block,
            window.start_block + new_size - 1,
        ))
    }

    fn grow(&self, size: u64) -> u64 {
        if self.growth_factor <= 1.0 {
            return size.min(self.max_chunk_scan_size);
        }
        let grown = (size as f64 * self.growth_factor).ceil();
        if grown >= self.max_chunk_scan_size as f64 {
            self.max_chunk_scan_size
        } else {
            (grown as u64).max(size)
        }
    }

    fn sized(&self, start: BlockPointer, size: u64, target_end: BlockPointer) -> Option<ScanWindow> {
        if start > target_end {
            return None;
        }
        let size = size.clamp(1, self.max_chunk_scan_size);
        let end = start.saturating_add(size - 1).min(target_end);
        Some(ScanWindow::new(start, end))
    }
}
