//! chainscan-core — foundation for the resumable, reorg-tolerant event scanner.
//!
//! # Architecture
//!
//! ```text
//! ScannerBuilder → EventScanner
//!                      ├── ReorgGuard      (drop the reorg-unsafe tail on start)
//!                      ├── WindowPlanner   (contiguous, shrinking block ranges)
//!                      ├── LogSource       (eth_getLogs / block timestamps)
//!                      ├── EventDecoder    (raw log → typed event)
//!                      └── CheckpointStore (JSON file / memory)
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod progress;
pub mod reorg;
pub mod serde_helpers;
pub mod types;
pub mod window;

pub use checkpoint::{CheckpointStore, FlushPolicy, ScanState};
pub use config::{ScannerConfig, ScannerState};
pub use error::{ProviderError, ScanError};
pub use progress::{ChunkProgress, NoProgress, ProgressReporter};
pub use reorg::ReorgGuard;
pub use types::{
    BlockPointer, BlockSummary, DecodedEvent, EventFilter, EventKey, EventKind, EventPayload,
    EventRecord, ScanResult, ScanWindow, ScannedEvent,
};
pub use window::WindowPlanner;
