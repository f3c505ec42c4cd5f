//! chainscan-evm — EVM log source, event decoder and scan loop.

pub mod builder;
pub mod decoder;
pub mod fetcher;
pub mod rpc;
pub mod scanner;

pub use builder::ScannerBuilder;
pub use decoder::{AbiEventDecoder, EventDecoder};
pub use fetcher::{EvmFetcher, LogSource, RawLog};
pub use rpc::HttpLogSource;
pub use scanner::EventScanner;
