//! The event scanner. Drives one resumable scan over a block range.
//!
//! # Per scan
//! 1. Truncate: drop records the last run may have taken from a fork.
//! 2. For each window from the planner:
//!    fetch logs → decode all → resolve block timestamps → write records
//!    → `end_chunk` → report progress.
//! 3. On a transient provider error while fetching logs or block timestamps,
//!    back off, halve the window and retry from the same block. A
//!    single-block window that still fails is fatal.
//!
//! Cancellation is observed between chunks only, so the checkpoint always
//! sits on a chunk boundary.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chainscan_core::checkpoint::CheckpointStore;
use chainscan_core::config::{ScannerConfig, ScannerState};
use chainscan_core::error::{ProviderError, ScanError};
use chainscan_core::progress::{ChunkProgress, ProgressReporter};
use chainscan_core::reorg::ReorgGuard;
use chainscan_core::types::{
    BlockPointer, DecodedEvent, EventFilter, EventRecord, ScanResult, ScanWindow, ScannedEvent,
};
use chainscan_core::window::WindowPlanner;

use crate::decoder::EventDecoder;
use crate::fetcher::{EvmFetcher, LogSource, RawLog};

/// A chunk that is fully fetched and decoded but not yet written.
struct FetchedChunk {
    window: ScanWindow,
    events: Vec<DecodedEvent>,
    times: HashMap<BlockPointer, DateTime<Utc>>,
}

/// Scans a log source for the decoder's event kinds into a checkpoint store.
pub struct EventScanner<C, D, S> {
    config: ScannerConfig,
    fetcher: EvmFetcher<C>,
    decoder: D,
    store: S,
    planner: WindowPlanner,
    guard: ReorgGuard,
    filter: EventFilter,
    state: ScannerState,
    cancel: CancellationToken,
}

impl<C, D, S> EventScanner<C, D, S>
where
    C: LogSource,
    D: EventDecoder,
    S: CheckpointStore,
{
    /// Create a scanner. The store should already be restored.
    ///
    /// When the configured filter has no topic0 values, the decoder's topics
    /// are used so the node only returns logs this scanner can decode.
    pub fn new(config: ScannerConfig, client: C, decoder: D, store: S) -> Result<Self, ScanError> {
        config.validate()?;
        let mut filter = config.filter.clone();
        if filter.topic0_values.is_empty() {
            filter.topic0_values = decoder.topics();
        }
        Ok(Self {
            fetcher: EvmFetcher::new(client, config.timestamp_concurrency),
            planner: WindowPlanner::new(config.max_chunk_scan_size)
                .with_growth(config.chunk_growth_factor),
            guard: ReorgGuard::new(config.reorg_safety_blocks),
            decoder,
            store,
            filter,
            state: ScannerState::Idle,
            cancel: CancellationToken::new(),
            config,
        })
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Token that stops a running scan at the next chunk boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Chain head minus `end_block_buffer`.
    pub async fn get_suggested_scan_end_block(&self) -> Result<BlockPointer, ScanError> {
        let head = self.fetcher.head_block_number().await?;
        Ok(head.saturating_sub(self.config.end_block_buffer))
    }

    /// Where a resumed scan should start: the checkpoint minus the reorg margin.
    pub fn resume_block(&self) -> BlockPointer {
        self.guard.resume_from(self.store.last_scanned_block())
    }

    /// Drop every record at or above `since_block`.
    pub async fn delete_potentially_forked_block_data(
        &mut self,
        since_block: BlockPointer,
    ) -> Result<usize, ScanError> {
        let removed = self.store.delete_data(since_block).await?;
        if removed > 0 {
            info!(since_block, removed, "Discarded potentially forked events");
        }
        Ok(removed)
    }

    /// Scan `[start_block, end_block]`, writing every decoded event through the store.
    ///
    /// Returns an empty result when `start_block > end_block`. On error the
    /// store keeps everything up to the last committed chunk.
    pub async fn scan<P>(
        &mut self,
        start_block: BlockPointer,
        end_block: BlockPointer,
        progress: &mut P,
    ) -> Result<ScanResult, ScanError>
    where
        P: ProgressReporter + ?Sized,
    {
        if start_block > end_block {
            debug!(start_block, end_block, "Nothing to scan");
            self.state = ScannerState::Done;
            return Ok(ScanResult::default());
        }

        match self.run(start_block, end_block, progress).await {
            Ok(result) => {
                self.state = ScannerState::Done;
                info!(
                    start_block,
                    end_block,
                    events = result.len(),
                    chunks = result.chunks_scanned,
                    cancelled = result.cancelled,
                    "Scan finished"
                );
                Ok(result)
            }
            Err(e) => {
                error!(
                    error = %e,
                    during = %self.state,
                    last_scanned_block = self.store.last_scanned_block(),
                    "Scan failed"
                );
                self.state = ScannerState::Failed;
                Err(e)
            }
        }
    }

    async fn run<P>(
        &mut self,
        start_block: BlockPointer,
        end_block: BlockPointer,
        progress: &mut P,
    ) -> Result<ScanResult, ScanError>
    where
        P: ProgressReporter + ?Sized,
    {
        self.state = ScannerState::Truncating;
        // never discard data recorded before the requested start
        self.guard.truncate(&mut self.store, start_block).await?;

        info!(
            start_block,
            end_block,
            max_chunk_scan_size = self.planner.max_chunk_scan_size(),
            "Starting scan"
        );

        let mut result = ScanResult::default();
        self.state = ScannerState::Windowing;
        let mut next = self.planner.first(start_block, end_block);

        while let Some(planned) = next {
            if self.cancel.is_cancelled() {
                info!(at_block = planned.start_block, "Scan cancelled at chunk boundary");
                result.cancelled = true;
                break;
            }

            let FetchedChunk {
                window,
                events,
                times,
            } = self.fetch_chunk(planned).await?;

            let mut last_timestamp = None;
            for event in &events {
                let block = event.key.block_number;
                let timestamp = *times
                    .get(&block)
                    .ok_or(ProviderError::BlockNotFound(block))?;
                let key = self.store.process_event(timestamp, event).await?;
                debug!(event = %key, kind = %event.kind(), "Event recorded");
                result.events.push(ScannedEvent {
                    key,
                    record: EventRecord::new(event, timestamp),
                });
                last_timestamp = Some(timestamp);
            }

            self.state = ScannerState::Checkpointing;
            self.store.end_chunk(window.end_block).await?;
            result.chunks_scanned += 1;
            result.last_block = Some(window.end_block);

            let chunk = ChunkProgress {
                overall_start: start_block,
                overall_end: end_block,
                current_block: window.end_block,
                current_block_timestamp: last_timestamp,
                chunk_size: window.size(),
                events_in_chunk: events.len(),
            };
            info!(
                window = %window,
                events = events.len(),
                done = chunk.blocks_done(),
                total = chunk.blocks_total(),
                "Chunk committed"
            );
            progress.on_chunk(&chunk);

            self.state = ScannerState::Windowing;
            next = self.planner.next(window, end_block);
        }

        Ok(result)
    }

    /// Fetch, decode and timestamp `window`, shrinking it until the provider accepts.
    async fn fetch_chunk(&mut self, mut window: ScanWindow) -> Result<FetchedChunk, ScanError> {
        loop {
            self.store.start_chunk(window.start_block, window.size()).await;
            match self.try_fetch(window).await {
                Ok(chunk) => return Ok(chunk),
                Err(ScanError::Provider(e)) if e.is_transient() => {
                    let Some(smaller) = self.planner.shrink(window) else {
                        return Err(ScanError::WindowExhausted {
                            start_block: window.start_block,
                            source: e,
                        });
                    };
                    warn!(
                        error = %e,
                        window = %window,
                        retry = %smaller,
                        during = %self.state,
                        "Provider rejected window, shrinking"
                    );
                    let backoff = self.config.retry_backoff();
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                    window = smaller;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch(&mut self, window: ScanWindow) -> Result<FetchedChunk, ScanError> {
        self.state = ScannerState::Fetching;
        let logs = self.fetcher.logs(window, &self.filter).await?;

        self.state = ScannerState::Decoding;
        let events = self.decode_logs(&logs)?;
        let blocks: BTreeSet<BlockPointer> = events.iter().map(|e| e.key.block_number).collect();
        let times = self.fetcher.block_timestamps(&blocks).await?;

        Ok(FetchedChunk {
            window,
            events,
            times,
        })
    }

    /// Decode every live log of a chunk, in chain order. Any failure aborts the chunk.
    fn decode_logs(&self, logs: &[RawLog]) -> Result<Vec<DecodedEvent>, ScanError> {
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if log.is_removed() {
                debug!(log = %log.reference(), "Skipping removed log");
                continue;
            }
            events.push(self.decoder.decode(log)?);
        }
        events.sort_by_key(|e| (e.key.block_number, e.key.log_index));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testing::*;
    use crate::decoder::AbiEventDecoder;
    use async_trait::async_trait;
    use chainscan_core::checkpoint::{FlushPolicy, ScanState};
    use chainscan_core::progress::NoProgress;
    use chainscan_core::types::{BlockSummary, EventKey, EventKind, EventPayload};
    use chainscan_storage::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn ts(block: u64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_600_000_000 + block as i64 * 12, 0).unwrap()
    }

    /// In-process chain: a fixed set of logs and a provider range limit.
    #[derive(Default)]
    struct MockChain {
        head: u64,
        logs: Vec<RawLog>,
        max_range: Option<u64>,
        always_throttled: bool,
        /// Number of block lookups to reject before answering.
        block_throttles: AtomicUsize,
        requests: Mutex<Vec<(u64, u64)>>,
    }

    impl MockChain {
        fn with_logs(head: u64, logs: Vec<RawLog>) -> Self {
            Self {
                head,
                logs,
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<(u64, u64)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogSource for MockChain {
        async fn get_chain_head(&self) -> Result<u64, ProviderError> {
            Ok(self.head)
        }

        async fn get_block(&self, number: u64) -> Result<Option<BlockSummary>, ProviderError> {
            let throttled = self
                .block_throttles
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if throttled {
                return Err(ProviderError::RateLimited("too many requests".into()));
            }
            Ok((number <= self.head).then(|| BlockSummary {
                number,
                hash: format!("0x{number:064x}"),
                timestamp: ts(number).timestamp(),
            }))
        }

        async fn get_logs(
            &self,
            from: u64,
            to: u64,
            _filter: &EventFilter,
        ) -> Result<Vec<RawLog>, ProviderError> {
            self.requests.lock().unwrap().push((from, to));
            if self.always_throttled {
                return Err(ProviderError::RateLimited("slow down".into()));
            }
            if let Some(max) = self.max_range {
                if to - from + 1 > max {
                    return Err(ProviderError::RangeTooLarge {
                        from,
                        to,
                        reason: "query returned more than 10000 results".into(),
                    });
                }
            }
            Ok(self
                .logs
                .iter()
                .filter(|l| (from..=to).contains(&l.block_number_u64().unwrap()))
                .cloned()
                .collect())
        }
    }

    fn config(max_chunk_scan_size: u64) -> ScannerConfig {
        ScannerConfig {
            max_chunk_scan_size,
            reorg_safety_blocks: 10,
            flush_interval_secs: 0,
            retry_backoff_ms: 0,
            event_kinds: vec![EventKind::Transfer],
            ..Default::default()
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(FlushPolicy::new(Duration::ZERO))
    }

    fn scanner(
        config: ScannerConfig,
        chain: MockChain,
        store: MemoryStore,
    ) -> EventScanner<MockChain, AbiEventDecoder, MemoryStore> {
        let decoder = AbiEventDecoder::new(&config.event_kinds);
        EventScanner::new(config, chain, decoder, store).unwrap()
    }

    fn stored_blocks(s: &EventScanner<MockChain, AbiEventDecoder, MemoryStore>) -> Vec<u64> {
        s.store().state().blocks.keys().copied().collect()
    }

    #[tokio::test]
    async fn resume_scan_covers_margin_in_one_chunk() {
        // checkpoint 1000, 10 blocks of reorg margin, 500-block chunks, head 1300
        let mut previous = ScanState {
            last_scanned_block: 1000,
            ..Default::default()
        };
        for (block, value) in [(980, 1), (989, 2), (995, 3)] {
            let record = EventRecord {
                payload: EventPayload::Transfer {
                    from: alloy_primitives::Address::ZERO,
                    to: alloy_primitives::Address::ZERO,
                    value: alloy_primitives::U256::from(value),
                },
                address: alloy_primitives::Address::ZERO,
                timestamp: ts(block),
            };
            previous.upsert(&EventKey::new(block, "0xold", 0), record);
        }
        let mut store = MemoryStore::with_durable_state(previous, FlushPolicy::new(Duration::ZERO));
        store.restore().await;

        let chain = MockChain::with_logs(1300, vec![transfer_log(1200, "0xnew", 0, 9)]);
        let mut s = scanner(config(500), chain, store);
        assert_eq!(s.resume_block(), 990);

        let end = s.get_suggested_scan_end_block().await.unwrap();
        assert_eq!(end, 1300);
        let result = s.scan(s.resume_block(), end, &mut NoProgress).await.unwrap();

        assert_eq!(result.chunks_scanned, 1);
        assert_eq!(s.fetcher.client().requests(), vec![(990, 1300)]);
        assert_eq!(result.last_block, Some(1300));
        // the stale record in the margin is gone, older ones survive
        assert_eq!(stored_blocks(&s), vec![980, 989, 1200]);
        assert_eq!(s.store().last_scanned_block(), 1300);
        assert_eq!(s.state(), ScannerState::Done);
    }

    #[tokio::test]
    async fn range_too_large_shrinks_and_retries_same_start() {
        let chain = MockChain {
            head: 1300,
            max_range: Some(100),
            logs: vec![transfer_log(1000, "0x1", 0, 1), transfer_log(1299, "0x2", 0, 2)],
            ..Default::default()
        };
        let mut s = scanner(config(500), chain, store());
        let result = s.scan(990, 1300, &mut NoProgress).await.unwrap();

        let requests = s.fetcher.client().requests();
        assert_eq!(&requests[..3], &[(990, 1300), (990, 1144), (990, 1066)]);

        let accepted: Vec<_> = requests.into_iter().filter(|(f, t)| t - f < 100).collect();
        assert_eq!(accepted.first().unwrap().0, 990);
        assert_eq!(accepted.last().unwrap().1, 1300);
        for pair in accepted.windows(2) {
            assert_eq!(pair[1].0, pair[0].1 + 1);
        }
        assert_eq!(result.chunks_scanned, accepted.len() as u64);
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn single_block_failure_is_fatal() {
        let chain = MockChain {
            head: 100,
            always_throttled: true,
            ..Default::default()
        };
        let mut s = scanner(config(8), chain, store());
        let err = s.scan(0, 9, &mut NoProgress).await.unwrap_err();

        assert!(matches!(err, ScanError::WindowExhausted { start_block: 0, .. }));
        let sizes: Vec<u64> = s
            .fetcher
            .client()
            .requests()
            .iter()
            .map(|(f, t)| t - f + 1)
            .collect();
        assert_eq!(sizes, vec![8, 4, 2, 1]);
        assert_eq!(s.state(), ScannerState::Failed);
        assert_eq!(s.store().last_scanned_block(), 0);
    }

    #[tokio::test]
    async fn throttled_timestamp_lookup_shrinks_and_retries() {
        let chain = MockChain {
            block_throttles: AtomicUsize::new(1),
            ..MockChain::with_logs(200, vec![transfer_log(5, "0xaa", 0, 1)])
        };
        let mut s = scanner(config(100), chain, store());
        let result = s.scan(0, 99, &mut NoProgress).await.unwrap();

        assert_eq!(s.fetcher.client().requests(), vec![(0, 99), (0, 49), (50, 99)]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.events[0].record.timestamp, ts(5));
        assert_eq!(result.last_block, Some(99));
        assert_eq!(s.store().last_scanned_block(), 99);
    }

    #[tokio::test]
    async fn throttled_timestamp_lookup_on_single_block_is_fatal() {
        let chain = MockChain {
            block_throttles: AtomicUsize::new(usize::MAX),
            ..MockChain::with_logs(200, vec![transfer_log(0, "0xaa", 0, 1)])
        };
        let mut s = scanner(config(4), chain, store());
        let err = s.scan(0, 3, &mut NoProgress).await.unwrap_err();

        assert!(matches!(
            err,
            ScanError::WindowExhausted {
                start_block: 0,
                source: ProviderError::RateLimited(_),
            }
        ));
        assert_eq!(s.fetcher.client().requests(), vec![(0, 3), (0, 1), (0, 0)]);
        assert!(s.store().state().blocks.is_empty());
        assert_eq!(s.state(), ScannerState::Failed);
    }

    #[tokio::test]
    async fn forked_tail_is_discarded_without_moving_checkpoint() {
        let mut previous = ScanState {
            last_scanned_block: 1000,
            ..Default::default()
        };
        for block in [985, 990, 995, 999] {
            let event = DecodedEvent {
                key: EventKey::new(block, "0xold", 0),
                address: alloy_primitives::Address::repeat_byte(0x76),
                payload: EventPayload::Transfer {
                    from: alloy_primitives::Address::ZERO,
                    to: alloy_primitives::Address::ZERO,
                    value: alloy_primitives::U256::from(block),
                },
            };
            previous.upsert(&event.key, EventRecord::new(&event, ts(block)));
        }
        let mut store = MemoryStore::with_durable_state(previous, FlushPolicy::new(Duration::ZERO));
        store.restore().await;
        let mut s = scanner(config(500), MockChain::with_logs(1300, vec![]), store);

        let since = s.resume_block();
        assert_eq!(since, 990);
        let removed = s.delete_potentially_forked_block_data(since).await.unwrap();

        assert_eq!(removed, 3);
        assert_eq!(stored_blocks(&s), vec![985]);
        assert!(stored_blocks(&s).iter().all(|b| *b < since));
        assert_eq!(s.store().last_scanned_block(), 1000);
        assert_eq!(s.delete_potentially_forked_block_data(since).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn records_carry_emitting_contract() {
        let log = transfer_log(5, "0xaa", 0, 1);
        let emitter: alloy_primitives::Address = log.address.parse().unwrap();
        let mut s = scanner(config(100), MockChain::with_logs(100, vec![log]), store());
        let result = s.scan(0, 99, &mut NoProgress).await.unwrap();

        assert_eq!(result.events[0].record.address, emitter);
        let stored = s.store().state().get(&result.events[0].key).unwrap();
        assert_eq!(stored.address, emitter);
    }

    #[tokio::test]
    async fn logs_in_one_transaction_are_kept_apart() {
        let chain = MockChain::with_logs(
            100,
            vec![transfer_log(5, "0xaa", 1, 2), transfer_log(5, "0xaa", 0, 1)],
        );
        let mut s = scanner(config(100), chain, store());
        let result = s.scan(0, 100, &mut NoProgress).await.unwrap();

        let keys: Vec<String> = result.events.iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["5-0xaa-0", "5-0xaa-1"]);
        assert_eq!(s.store().state().event_count(), 2);
        let record = s.store().state().get(&EventKey::new(5, "0xaa", 1)).unwrap();
        assert_eq!(record.timestamp, ts(5));
    }

    #[tokio::test]
    async fn rescanning_is_idempotent() {
        let logs = vec![
            transfer_log(3, "0xaa", 0, 1),
            transfer_log(42, "0xbb", 2, 5),
            transfer_log(77, "0xcc", 0, 6),
        ];
        let mut s = scanner(config(25), MockChain::with_logs(100, logs), store());

        s.scan(0, 99, &mut NoProgress).await.unwrap();
        let first = s.store().state().clone();
        s.scan(0, 99, &mut NoProgress).await.unwrap();
        assert_eq!(s.store().state(), &first);
        assert_eq!(first.event_count(), 3);
    }

    #[tokio::test]
    async fn start_after_end_scans_nothing() {
        let mut s = scanner(config(100), MockChain::with_logs(100, vec![]), store());
        let result = s.scan(11, 10, &mut NoProgress).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.chunks_scanned, 0);
        assert!(s.fetcher.client().requests().is_empty());
    }

    #[tokio::test]
    async fn decode_failure_keeps_last_committed_chunk() {
        let by = alloy_primitives::Address::repeat_byte(0xb0);
        let logs = vec![
            transfer_log(5, "0xaa", 0, 1),
            transfer_log(150, "0xbb", 0, 2),
            // not a configured kind
            raw_log(EventKind::Staked, 160, "0xcc", 0, [by, by], &[uint_word(3)]),
        ];
        let mut s = scanner(config(100), MockChain::with_logs(300, logs), store());
        let err = s.scan(0, 199, &mut NoProgress).await.unwrap_err();

        assert!(matches!(err, ScanError::Decoding { .. }));
        assert_eq!(s.state(), ScannerState::Failed);
        assert_eq!(s.store().last_scanned_block(), 99);
        assert_eq!(stored_blocks(&s), vec![5]);
    }

    #[tokio::test]
    async fn removed_logs_are_skipped() {
        let mut dropped = transfer_log(8, "0xdead", 0, 1);
        dropped.removed = Some(true);
        let chain = MockChain::with_logs(100, vec![dropped, transfer_log(9, "0xbeef", 0, 2)]);
        let mut s = scanner(config(100), chain, store());
        let result = s.scan(0, 50, &mut NoProgress).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(stored_blocks(&s), vec![9]);
    }

    #[tokio::test]
    async fn cancellation_stops_at_chunk_boundary() {
        let mut s = scanner(config(10), MockChain::with_logs(100, vec![]), store());
        let token = s.cancellation_token();
        let mut stop_after_second = |p: &ChunkProgress| {
            if p.current_block >= 19 {
                token.cancel();
            }
        };
        let result = s.scan(0, 99, &mut stop_after_second).await.unwrap();

        assert!(result.cancelled);
        assert_eq!(result.chunks_scanned, 2);
        assert_eq!(result.last_block, Some(19));
        assert_eq!(s.store().last_scanned_block(), 19);
    }

    #[tokio::test]
    async fn crash_and_resume_matches_uninterrupted_scan() {
        let logs: Vec<RawLog> = (0..30)
            .step_by(4)
            .map(|b| transfer_log(b, &format!("0x{b:x}"), 0, b))
            .collect();
        let cfg = ScannerConfig {
            reorg_safety_blocks: 5,
            ..config(10)
        };

        let mut reference = scanner(cfg.clone(), MockChain::with_logs(29, logs.clone()), store());
        reference.scan(0, 29, &mut NoProgress).await.unwrap();

        // only the first chunk is ever flushed
        let hourly = MemoryStore::new(FlushPolicy::new(Duration::from_secs(3600)));
        let mut s = scanner(cfg, MockChain::with_logs(29, logs), hourly);
        s.scan(0, 29, &mut NoProgress).await.unwrap();
        assert_eq!(s.store().durable_state().unwrap().last_scanned_block, 9);

        s.store_mut().crash();
        s.store_mut().restore().await;
        assert_eq!(s.store().last_scanned_block(), 9);
        assert_eq!(s.resume_block(), 4);

        s.scan(s.resume_block(), 29, &mut NoProgress).await.unwrap();
        assert_eq!(s.store().state(), reference.store().state());
    }

    #[tokio::test]
    async fn progress_reports_each_chunk() {
        let chain = MockChain::with_logs(
            100,
            vec![transfer_log(7, "0xbb", 0, 2), transfer_log(3, "0xaa", 0, 1)],
        );
        let mut s = scanner(config(10), chain, store());
        let mut seen = Vec::new();
        let mut reporter = |p: &ChunkProgress| seen.push(p.clone());
        s.scan(0, 19, &mut reporter).await.unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].current_block, 9);
        assert_eq!(seen[0].current_block_timestamp, Some(ts(7)));
        assert_eq!(seen[0].events_in_chunk, 2);
        assert_eq!(seen[0].chunk_size, 10);
        assert_eq!(seen[1].current_block, 19);
        assert_eq!(seen[1].current_block_timestamp, None);
        assert_eq!(seen[1].blocks_done(), seen[1].blocks_total());
    }

    #[tokio::test]
    async fn suggested_end_respects_buffer() {
        let cfg = ScannerConfig {
            end_block_buffer: 5,
            ..config(100)
        };
        let s = scanner(cfg, MockChain::with_logs(1300, vec![]), store());
        assert_eq!(s.get_suggested_scan_end_block().await.unwrap(), 1295);
    }

    #[test]
    fn filter_defaults_to_decoder_topics() {
        let cfg = ScannerConfig {
            event_kinds: vec![EventKind::Staked, EventKind::Unstaked],
            ..config(100)
        };
        let s = scanner(cfg, MockChain::default(), store());
        assert_eq!(s.filter.topic0_values.len(), 2);
        assert!(s
            .filter
            .topic0_values
            .contains(&format!("{:?}", EventKind::Staked.topic0())));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let decoder = AbiEventDecoder::new(&[EventKind::Transfer]);
        let result = EventScanner::new(config(0), MockChain::default(), decoder, store());
        assert!(matches!(result, Err(ScanError::Config(_))));
    }
}
