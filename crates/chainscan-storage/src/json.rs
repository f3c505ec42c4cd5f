//! JSON file checkpoint store.
//!
//! The whole scan state lives in memory and is written to a single JSON file:
//!
//! ```json
//! {
//!   "last_scanned_block": 14307725,
//!   "blocks": {
//!     "14307701": {
//!       "0x5c50…": { "0": { "event": "Transfer", "from": "0x…", "to": "0x…",
//!                           "value": "1000", "address": "0x767f…",
//!                           "timestamp": "2022-03-01T…Z" } }
//!     }
//!   }
//! }
//! ```
//!
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a crash mid-write leaves the previous file intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use chainscan_core::checkpoint::{CheckpointStore, FlushPolicy, ScanState};
use chainscan_core::error::ScanError;
use chainscan_core::types::{BlockPointer, DecodedEvent, EventKey, EventRecord};

/// File-backed checkpoint store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: ScanState,
    flush: FlushPolicy,
}

impl JsonFileStore {
    /// Create a store for `path`. Call [`CheckpointStore::restore`] before use.
    pub fn new(path: impl Into<PathBuf>, flush: FlushPolicy) -> Self {
        Self {
            path: path.into(),
            state: ScanState::default(),
            flush,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the state file.
    ///
    /// `Ok(None)` when the file does not exist.
    pub async fn load(path: &Path) -> Result<Option<ScanState>, ScanError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ScanError::StorageCorruption {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| ScanError::StorageCorruption {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("scan-state.json");
        self.path
            .with_file_name(format!(".{file_name}.tmp-{}", std::process::id()))
    }

    fn write_error(&self, path: &Path, e: impl std::fmt::Display) -> ScanError {
        ScanError::StorageWrite {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    }

    async fn flush_now(&mut self) -> Result<(), ScanError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(parent, e))?;
        }
        let encoded = serde_json::to_vec(&self.state).map_err(|e| self.write_error(&self.path, e))?;

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &encoded)
            .await
            .map_err(|e| self.write_error(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.write_error(&self.path, e));
        }

        self.flush.mark_flushed();
        debug!(
            path = %self.path.display(),
            last_scanned_block = self.state.last_scanned_block,
            bytes = encoded.len(),
            "Checkpoint flushed"
        );
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for JsonFileStore {
    async fn restore(&mut self) {
        match Self::load(&self.path).await {
            Ok(Some(state)) => {
                info!(
                    path = %self.path.display(),
                    last_scanned_block = state.last_scanned_block,
                    events = state.event_count(),
                    "Restored scan state"
                );
                self.state = state;
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No scan state found, starting from scratch");
                self.state = ScanState::default();
            }
            Err(e) => {
                warn!(error = %e, "Scan state unreadable, starting from scratch");
                self.state = ScanState::default();
            }
        }
    }

    fn last_scanned_block(&self) -> BlockPointer {
        self.state.last_scanned_block
    }

    async fn start_chunk(&mut self, block_number: BlockPointer, chunk_size: u64) {
        debug!(block_number, chunk_size, "Chunk started");
    }

    async fn end_chunk(&mut self, block_number: BlockPointer) -> Result<(), ScanError> {
        self.state.last_scanned_block = block_number;
        if self.flush.is_due() {
            self.flush_now().await?;
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
        self.flush_now().await
    }

    fn state(&self) -> &ScanState {
        &self.state
    }
}
