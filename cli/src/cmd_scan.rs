//! `chainscan scan`: run one resumable scan against a JSON-RPC node.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use chainscan_core::checkpoint::CheckpointStore;
use chainscan_core::config::ScannerConfig;
use chainscan_core::progress::ChunkProgress;
use chainscan_core::types::EventKind;
use chainscan_evm::{HttpLogSource, ScannerBuilder};

#[derive(Args)]
pub struct ScanArgs {
    /// JSON-RPC endpoint
    #[arg(long, env = "CHAINSCAN_RPC_URL")]
    rpc_url: String,
    /// Path to the state file
    #[arg(long, env = "CHAINSCAN_STATE_FILE", default_value = "scan-state.json")]
    state_file: PathBuf,
    /// JSON scanner configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Contract address to scan (repeatable)
    #[arg(long = "address")]
    addresses: Vec<String>,
    /// Event kind to record: Transfer, Staked, Unstaked, YieldClaimed (repeatable)
    #[arg(long = "event")]
    events: Vec<EventKind>,
    #[arg(long)]
    max_chunk_scan_size: Option<u64>,
    #[arg(long)]
    reorg_safety_blocks: Option<u64>,
    #[arg(long)]
    end_block_buffer: Option<u64>,
    #[arg(long)]
    flush_interval_secs: Option<u64>,
    /// Stop at this block instead of the suggested end block
    #[arg(long)]
    end_block: Option<u64>,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,
}

impl ScanArgs {
    fn builder(&self) -> Result<ScannerBuilder> {
        let config = match &self.config {
            Some(path) => ScannerConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ScannerConfig::default(),
        };
        let mut builder = ScannerBuilder::from_config(config);
        if let Some(n) = self.max_chunk_scan_size {
            builder = builder.max_chunk_scan_size(n);
        }
        if let Some(n) = self.reorg_safety_blocks {
            builder = builder.reorg_safety_blocks(n);
        }
        if let Some(n) = self.end_block_buffer {
            builder = builder.end_block_buffer(n);
        }
        if let Some(n) = self.flush_interval_secs {
            builder = builder.flush_interval_secs(n);
        }
        if !self.events.is_empty() {
            builder = builder.event_kinds(self.events.iter().copied());
        }
        for address in &self.addresses {
            builder = builder.address(address.clone());
        }
        Ok(builder)
    }
}

pub async fn run(args: ScanArgs) -> Result<()> {
    let client = HttpLogSource::new(&args.rpc_url, Duration::from_secs(args.request_timeout_secs))?;
    let mut scanner = args
        .builder()?
        .build_with_json_store(client, &args.state_file)
        .await
        .context("creating scanner")?;

    let token = scanner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current chunk");
            token.cancel();
        }
    });

    let start = scanner.resume_block();
    let end = match args.end_block {
        Some(end) => end,
        None => scanner
            .get_suggested_scan_end_block()
            .await
            .context("querying chain head")?,
    };
    if start > end {
        info!(start, end, "Already up to date");
        return Ok(());
    }
    info!(
        start,
        end,
        blocks = end - start + 1,
        state_file = %args.state_file.display(),
        "Scanning"
    );

    let started = Instant::now();
    let mut report = |p: &ChunkProgress| {
        let pct = p.blocks_done() as f64 * 100.0 / p.blocks_total() as f64;
        info!(
            block = p.current_block,
            time = ?p.current_block_timestamp,
            events = p.events_in_chunk,
            "{pct:.1}% done"
        );
    };
    let outcome = scanner.scan(start, end, &mut report).await;

    // committed chunks are persisted even when the scan failed
    scanner
        .store_mut()
        .save()
        .await
        .context("saving scan state")?;

    let result = outcome.context("scan failed")?;
    info!(
        events = result.len(),
        chunks = result.chunks_scanned,
        last_block = ?result.last_block,
        cancelled = result.cancelled,
        elapsed = ?started.elapsed(),
        "Scan complete"
    );
    Ok(())
}
