//! chainscan-storage — checkpoint store backends for ChainScan.
//!
//! Backends:
//! - [`json`]: single JSON file, atomic replace on every flush
//! - [`memory`]: in-memory (dev/testing, no persistence)

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
