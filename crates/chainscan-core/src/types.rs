//! Shared types for the scanning pipeline.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block height.
pub type BlockPointer = u64;

// ─── BlockSummary ─────────────────────────────────────────────────────────────

/// A minimal summary of a block, enough to timestamp the events it contains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Block number.
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

impl BlockSummary {
    /// The block timestamp as a UTC date-time, `None` if out of range.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0)
    }
}

// ─── ScanWindow ───────────────────────────────────────────────────────────────

/// One inclusive block range requested from the log source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanWindow {
    pub start_block: BlockPointer,
    pub end_block: BlockPointer,
}

impl ScanWindow {
    pub fn new(start_block: BlockPointer, end_block: BlockPointer) -> Self {
        debug_assert!(start_block <= end_block, "empty scan window");
        Self {
            start_block,
            end_block,
        }
    }

    /// Number of blocks covered (`end - start + 1`).
    pub fn size(&self) -> u64 {
        self.end_block - self.start_block + 1
    }
}

impl fmt::Display for ScanWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_block, self.end_block)
    }
}

// ─── EventFilter ─────────────────────────────────────────────────────────────

/// Filter for which logs to request from the log source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only fetch logs from these contract addresses (empty = all addresses).
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Only fetch logs with one of these topic[0] values (empty = all events).
    #[serde(default)]
    pub topic0_values: Vec<String>,
}

impl EventFilter {
    /// Create a filter for a single contract address.
    pub fn address(addr: impl Into<String>) -> Self {
        Self {
            addresses: vec![addr.into()],
            ..Default::default()
        }
    }

    /// Add a topic0 filter (event signature hash).
    pub fn topic0(mut self, topic: impl Into<String>) -> Self {
        self.topic0_values.push(topic.into());
        self
    }
}

// ─── EventKind / EventPayload ────────────────────────────────────────────────

/// The closed set of contract events the scanner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// ERC-20 `Transfer(address indexed from, address indexed to, uint256 value)`.
    Transfer,
    /// Pool `Staked(address indexed _by, address indexed _from, uint256 amount)`.
    Staked,
    /// Pool `Unstaked(address indexed _by, address indexed _to, uint256 amount)`.
    Unstaked,
    /// Pool `YieldClaimed(address indexed _by, address indexed _to, bool sIlv, uint256 amount)`.
    YieldClaimed,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Transfer,
        EventKind::Staked,
        EventKind::Unstaked,
        EventKind::YieldClaimed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer => "Transfer",
            Self::Staked => "Staked",
            Self::Unstaked => "Unstaked",
            Self::YieldClaimed => "YieldClaimed",
        }
    }

    /// Canonical Solidity signature used to derive topic0.
    pub fn signature(&self) -> &'static str {
        match self {
            Self::Transfer => "Transfer(address,address,uint256)",
            Self::Staked => "Staked(address,address,uint256)",
            Self::Unstaked => "Unstaked(address,address,uint256)",
            Self::YieldClaimed => "YieldClaimed(address,address,bool,uint256)",
        }
    }

    /// keccak-256 of the signature.
    pub fn topic0(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown event kind '{s}'"))
    }
}

/// Kind-specific typed fields of a decoded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum EventPayload {
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "crate::serde_helpers::u256_decimal")]
        value: U256,
    },
    Staked {
        by: Address,
        from: Address,
        #[serde(with = "crate::serde_helpers::u256_decimal")]
        amount: U256,
    },
    Unstaked {
        by: Address,
        to: Address,
        #[serde(with = "crate::serde_helpers::u256_decimal")]
        amount: U256,
    },
    YieldClaimed {
        by: Address,
        to: Address,
        s_ilv: bool,
        #[serde(with = "crate::serde_helpers::u256_decimal")]
        amount: U256,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Transfer { .. } => EventKind::Transfer,
            Self::Staked { .. } => EventKind::Staked,
            Self::Unstaked { .. } => EventKind::Unstaked,
            Self::YieldClaimed { .. } => EventKind::YieldClaimed,
        }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Identity of one log: `(block_number, transaction_hash, log_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub block_number: BlockPointer,
    pub tx_hash: String,
    pub log_index: u32,
}

impl EventKey {
    pub fn new(block_number: BlockPointer, tx_hash: impl Into<String>, log_index: u32) -> Self {
        Self {
            block_number,
            tx_hash: tx_hash.into(),
            log_index,
        }
    }
}

/// `"{block}-{tx_hash}-{log_index}"`, the reference handed back by the store.
impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.block_number, self.tx_hash, self.log_index)
    }
}

/// A log decoded into one of the known event kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub key: EventKey,
    /// Contract that emitted the log.
    pub address: Address,
    pub payload: EventPayload,
}

impl DecodedEvent {
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// The stored form of an event: payload, emitting contract and the containing block's time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(flatten)]
    pub payload: EventPayload,
    /// Contract that emitted the log. Tells events of different pools apart.
    pub address: Address,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(event: &DecodedEvent, timestamp: DateTime<Utc>) -> Self {
        Self {
            payload: event.payload.clone(),
            address: event.address,
            timestamp,
        }
    }
}

/// One event produced by a scan, in chain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedEvent {
    pub key: EventKey,
    pub record: EventRecord,
}

/// Outcome of one `scan` call.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Every event written during the scan, ordered by block and log index.
    pub events: Vec<ScannedEvent>,
    /// Number of chunk requests that completed.
    pub chunks_scanned: u64,
    /// Last block committed through `end_chunk`, if any.
    pub last_block: Option<BlockPointer>,
    /// `true` if the scan stopped at a chunk boundary because it was cancelled.
    pub cancelled: bool,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_topic0_matches_erc20() {
        let topic = EventKind::Transfer.topic0();
        assert_eq!(
            format!("{topic:?}"),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn event_kind_parses_case_insensitively() {
        assert_eq!("transfer".parse::<EventKind>().unwrap(), EventKind::Transfer);
        assert_eq!("YieldClaimed".parse::<EventKind>().unwrap(), EventKind::YieldClaimed);
        assert!("Swap".parse::<EventKind>().is_err());
    }

    #[test]
    fn event_key_reference_format() {
        let key = EventKey::new(1200, "0xabc", 3);
        assert_eq!(key.to_string(), "1200-0xabc-3");
    }

    #[test]
    fn scan_window_size_is_inclusive() {
        assert_eq!(ScanWindow::new(990, 1300).size(), 311);
        assert_eq!(ScanWindow::new(5, 5).size(), 1);
    }

    #[test]
    fn event_record_json_is_tagged() {
        let record = EventRecord {
            payload: EventPayload::Transfer {
                from: Address::ZERO,
                to: Address::repeat_byte(0x11),
                value: U256::from(1_000_000_000_000_000_000u128),
            },
            address: Address::repeat_byte(0x76),
            timestamp: DateTime::<Utc>::from_timestamp(1_640_000_000, 0).unwrap(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "Transfer");
        assert_eq!(json["value"], "1000000000000000000");
        assert_eq!(json["address"], format!("{:?}", Address::repeat_byte(0x76)));

        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn event_filter_builder() {
        let f = EventFilter::address("0xAbCdEf").topic0("0xddf2");
        assert_eq!(f.addresses, vec!["0xAbCdEf"]);
        assert_eq!(f.topic0_values, vec!["0xddf2"]);
        assert_eq!(EventFilter::default().addresses.len(), 0);
    }

    #[test]
    fn record_keeps_emitting_contract() {
        let event = DecodedEvent {
            key: EventKey::new(1, "0xaa", 0),
            address: Address::repeat_byte(0x25),
            payload: EventPayload::Staked {
                by: Address::repeat_byte(0x01),
                from: Address::repeat_byte(0x02),
                amount: U256::from(5u64),
            },
        };
        let time = DateTime::<Utc>::from_timestamp(1_640_000_000, 0).unwrap();
        let record = EventRecord::new(&event, time);
        assert_eq!(record.address, Address::repeat_byte(0x25));
        assert_eq!(record.payload, event.payload);
        assert_eq!(record.timestamp, time);
    }
}
