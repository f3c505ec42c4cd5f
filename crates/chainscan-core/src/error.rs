//! Error types for the chainscan pipeline.

use thiserror::Error;

/// Errors reported by a ledger-log source.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("block range {from}..={to} rejected as too large: {reason}")]
    RangeTooLarge { from: u64, to: u64, reason: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("block {0} not found")]
    BlockNotFound(u64),

    #[error("RPC error: {0}")]
    Rpc(String),
}

impl ProviderError {
    /// Returns `true` if shrinking the requested range and retrying may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RangeTooLarge { .. } | Self::RateLimited(_) | Self::Timeout { .. }
        )
    }
}

/// Errors that can occur during scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("scan stuck at block {start_block}: provider still failing on a single-block window: {source}")]
    WindowExhausted {
        start_block: u64,
        source: ProviderError,
    },

    #[error("cannot decode log {reference}: {reason}")]
    Decoding { reference: String, reason: String },

    #[error("checkpoint file {path} is corrupt: {reason}")]
    StorageCorruption { path: String, reason: String },

    #[error("failed to write checkpoint {path}: {reason}")]
    StorageWrite { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScanError {
    pub fn decoding(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decoding {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}
