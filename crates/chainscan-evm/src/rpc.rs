//! JSON-RPC `LogSource` over HTTP, backed by `reqwest`.
//!
//! Only the three calls the scanner needs are implemented. Provider errors
//! are classified so that oversized ranges and throttling come back as
//! transient errors the scanner can react to by shrinking its window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use chainscan_core::error::ProviderError;
use chainscan_core::types::{BlockPointer, BlockSummary, EventFilter};

use crate::fetcher::{block_from_json, parse_hex_u64, LogSource, RawLog};

/// Phrases nodes and hosted providers use when a log query is too big.
const RANGE_TOO_LARGE_HINTS: &[&str] = &[
    "block range",
    "range too large",
    "range is too large",
    "query returned more than",
    "response size",
    "too many results",
    "log response size exceeded",
    "exceed maximum block range",
    "query timeout",
];

/// Phrases that indicate throttling rather than an oversized query.
const RATE_LIMIT_HINTS: &[&str] = &["rate limit", "too many requests", "exceeded its compute units"];

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// HTTP JSON-RPC log source.
pub struct HttpLogSource {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpLogSource {
    /// Create a source for the given JSON-RPC endpoint.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Rpc(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        range: Option<(BlockPointer, BlockPointer)>,
    ) -> Result<Value, ProviderError> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(format!("HTTP 429 from {}", self.url)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_rpc_error(status.as_u16() as i64, &body, range));
        }

        let body: JsonRpcResponse = resp.json().await.map_err(|e| self.transport_error(e))?;
        if let Some(err) = body.error {
            return Err(classify_rpc_error(err.code, &err.message, range));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    fn transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            ProviderError::Rpc(e.to_string())
        }
    }
}

#[async_trait]
impl LogSource for HttpLogSource {
    async fn get_chain_head(&self) -> Result<BlockPointer, ProviderError> {
        let v = self.call("eth_blockNumber", json!([]), None).await?;
        v.as_str()
            .and_then(parse_hex_u64)
            .ok_or_else(|| ProviderError::Rpc(format!("unexpected eth_blockNumber result: {v}")))
    }

    async fn get_block(&self, number: BlockPointer) -> Result<Option<BlockSummary>, ProviderError> {
        let v = self
            .call("eth_getBlockByNumber", json!([format!("0x{number:x}"), false]), None)
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        block_from_json(&v)
            .map(Some)
            .ok_or_else(|| ProviderError::Rpc(format!("malformed block {number}")))
    }

    async fn get_logs(
        &self,
        from: BlockPointer,
        to: BlockPointer,
        filter: &EventFilter,
    ) -> Result<Vec<RawLog>, ProviderError> {
        let v = self
            .call("eth_getLogs", json!([logs_params(from, to, filter)]), Some((from, to)))
            .await?;
        serde_json::from_value(v).map_err(|e| ProviderError::Rpc(format!("malformed logs: {e}")))
    }
}

/// Build the `eth_getLogs` filter object.
fn logs_params(from: BlockPointer, to: BlockPointer, filter: &EventFilter) -> Value {
    let mut params = json!({
        "fromBlock": format!("0x{from:x}"),
        "toBlock": format!("0x{to:x}"),
    });
    if !filter.addresses.is_empty() {
        params["address"] = json!(filter.addresses);
    }
    if !filter.topic0_values.is_empty() {
        params["topics"] = json!([filter.topic0_values]);
    }
    params
}

/// Map a node error onto the provider error taxonomy.
fn classify_rpc_error(
    code: i64,
    message: &str,
    range: Option<(BlockPointer, BlockPointer)>,
) -> ProviderError {
    let lower = message.to_lowercase();
    if code == 429 || RATE_LIMIT_HINTS.iter().any(|h| lower.contains(h)) {
        return ProviderError::RateLimited(format!("{code}: {message}"));
    }
    if let Some((from, to)) = range {
        if code == -32005 || RANGE_TOO_LARGE_HINTS.iter().any(|h| lower.contains(h)) {
            return ProviderError::RangeTooLarge {
                from,
                to,
                reason: format!("{code}: {message}"),
            };
        }
    }
    ProviderError::Rpc(format!("{code}: {message}"))
}
