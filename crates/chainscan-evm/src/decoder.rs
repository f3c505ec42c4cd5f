//! Raw log → typed event decoding for the supported event kinds.
//!
//! # EVM log layout
//! - `topics[0]` is keccak-256 of the event signature
//! - `topics[1..]` hold the indexed parameters, each one 32-byte word
//! - `data` holds the non-indexed parameters, ABI-encoded as 32-byte words

use std::collections::HashMap;

use alloy_primitives::{Address, B256, U256};

use chainscan_core::error::ScanError;
use chainscan_core::types::{DecodedEvent, EventKey, EventKind, EventPayload};

use crate::fetcher::RawLog;

const WORD: usize = 32;

/// Turns raw logs into typed events.
pub trait EventDecoder: Send + Sync {
    /// Decode one log. Logs of unknown kinds are an error, never skipped.
    fn decode(&self, log: &RawLog) -> Result<DecodedEvent, ScanError>;

    /// topic0 values of every kind this decoder accepts, `0x`-prefixed.
    fn topics(&self) -> Vec<String>;
}

/// Decoder for a fixed set of [`EventKind`]s.
#[derive(Debug, Clone)]
pub struct AbiEventDecoder {
    kinds: HashMap<B256, EventKind>,
}

impl AbiEventDecoder {
    pub fn new(kinds: &[EventKind]) -> Self {
        Self {
            kinds: kinds.iter().map(|k| (k.topic0(), *k)).collect(),
        }
    }
}

impl EventDecoder for AbiEventDecoder {
    fn decode(&self, log: &RawLog) -> Result<DecodedEvent, ScanError> {
        let reference = log.reference();
        let fail = |reason: String| ScanError::decoding(reference.clone(), reason);

        let block_number = log
            .block_number_u64()
            .ok_or_else(|| fail(format!("invalid block number '{}'", log.block_number)))?;
        let log_index = log
            .log_index_u32()
            .ok_or_else(|| fail(format!("invalid log index '{}'", log.log_index)))?;
        let address = parse_address(&log.address).map_err(&fail)?;

        let topics = log
            .topics
            .iter()
            .map(|t| parse_word(t))
            .collect::<Result<Vec<_>, _>>()
            .map_err(&fail)?;
        let topic0 = topics
            .first()
            .ok_or_else(|| fail("anonymous log without topic0".into()))?;
        let kind = *self
            .kinds
            .get(topic0)
            .ok_or_else(|| fail(format!("unknown event topic0 {topic0}")))?;

        let data = decode_hex(&log.data).map_err(&fail)?;
        let payload = decode_payload(kind, &topics, &data).map_err(&fail)?;

        Ok(DecodedEvent {
            key: EventKey::new(block_number, log.tx_hash.to_lowercase(), log_index),
            address,
            payload,
        })
    }

    fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.kinds.keys().map(|t| format!("{t:?}")).collect();
        topics.sort();
        topics
    }
}

fn decode_payload(kind: EventKind, topics: &[B256], data: &[u8]) -> Result<EventPayload, String> {
    match kind {
        EventKind::Transfer => Ok(EventPayload::Transfer {
            from: topic_address(topics, 1)?,
            to: topic_address(topics, 2)?,
            value: data_uint(data, 0)?,
        }),
        EventKind::Staked => Ok(EventPayload::Staked {
            by: topic_address(topics, 1)?,
            from: topic_address(topics, 2)?,
            amount: data_uint(data, 0)?,
        }),
        EventKind::Unstaked => Ok(EventPayload::Unstaked {
            by: topic_address(topics, 1)?,
            to: topic_address(topics, 2)?,
            amount: data_uint(data, 0)?,
        }),
        EventKind::YieldClaimed => Ok(EventPayload::YieldClaimed {
            by: topic_address(topics, 1)?,
            to: topic_address(topics, 2)?,
            s_ilv: data_bool(data, 0)?,
            amount: data_uint(data, 1)?,
        }),
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| format!("invalid hex: {e}"))
}

fn parse_word(s: &str) -> Result<B256, String> {
    let bytes = decode_hex(s)?;
    if bytes.len() != WORD {
        return Err(format!("topic must be 32 bytes, got {}", bytes.len()));
    }
    Ok(B256::from_slice(&bytes))
}

fn parse_address(s: &str) -> Result<Address, String> {
    let bytes = decode_hex(s)?;
    if bytes.len() != 20 {
        return Err(format!("address must be 20 bytes, got {}", bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

/// An indexed address: the low 20 bytes of a left-padded word.
fn topic_address(topics: &[B256], index: usize) -> Result<Address, String> {
    let word = topics
        .get(index)
        .ok_or_else(|| format!("missing indexed topic {index}"))?;
    word_to_address(word.as_slice())
}

fn word_to_address(word: &[u8]) -> Result<Address, String> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err("address word has non-zero padding".into());
    }
    Ok(Address::from_slice(&word[12..]))
}

fn data_word(data: &[u8], index: usize) -> Result<&[u8], String> {
    let start = index * WORD;
    data.get(start..start + WORD)
        .ok_or_else(|| format!("data too short for word {index}: {} bytes", data.len()))
}

fn data_uint(data: &[u8], index: usize) -> Result<U256, String> {
    Ok(U256::from_be_slice(data_word(data, index)?))
}

fn data_bool(data: &[u8], index: usize) -> Result<bool, String> {
    match U256::from_be_slice(data_word(data, index)?) {
        v if v.is_zero() => Ok(false),
        v if v == U256::from(1u8) => Ok(true),
        v => Err(format!("invalid bool word {v}")),
    }
}
