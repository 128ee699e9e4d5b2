//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module — part middle manager, part helicopter parent,
//! part that one project manager who schedules a meeting to plan the next meeting.
//!
//! One [`Supervisor::run`] is one generation of the cache:
//!
//! ```text
//!  clear_all ──▶ SourceWorker ──(bounded channel)──▶ DecodeWorker × N ──▶ accumulator
//!                                                          │                   │
//!                                                          └── full batches ──▶ flusher
//!  join everybody ──▶ drain the leftovers ──▶ final flush ──▶ LoadOutcome
//! ```
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB EVER
//! 🔒 Like Fight Club, but for async tasks. First rule: you don't pub the workers.

mod workers;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::accumulators::{Accumulator, AccumulatorBackend};
use crate::app_config::RuntimeConfig;
use crate::backends::{SourceBackend, Store, StoreBackend};
use crate::cancel::CancelToken;
use crate::errors::{DecodeError, LoadError};
use crate::flusher::{FlushCoordinator, FlushStats};
use crate::retry::{retry_with_backoff, timed};
use crate::transforms::PromotionCsv;
use workers::{DecodeTally, DecodeWorker, SourceWorker, StopSignal, Worker};

/// 🔢 Sample decode errors kept for the report. The rest are only counted.
pub(crate) const MAX_SAMPLE_ERRORS: usize = 10;

/// 📊 Everything one successful load has to say for itself.
#[derive(Debug, Default)]
pub(crate) struct LoadOutcome {
    pub(crate) rows_read: u64,
    pub(crate) rows_decoded: u64,
    pub(crate) rows_skipped: u64,
    pub(crate) sample_errors: Vec<DecodeError>,
    pub(crate) flush: FlushStats,
}

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
#[derive(Debug)]
pub(crate) struct Supervisor {
    runtime: RuntimeConfig,
    store: Arc<StoreBackend>,
}

impl Supervisor {
    pub(crate) fn new(runtime: RuntimeConfig, store: Arc<StoreBackend>) -> Self {
        Self { runtime, store }
    }

    /// 🧵 Run one full load: clear, stream, decode, flush, join, final flush.
    ///
    /// Errors, in order of who gets to speak first:
    /// 1. the reader (source failure, cancellation)
    /// 2. the first decode worker that failed (fail-fast decode, store)
    ///
    /// A failed load skips the final flush. Batches already flushed stay flushed.
    pub(crate) async fn run(
        &self,
        source: SourceBackend,
        cancel: CancelToken,
    ) -> Result<LoadOutcome, LoadError> {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled { rows_read: 0 });
        }

        let policy = self.runtime.store_policy();
        let store = &self.store;
        retry_with_backoff("clear_all", &policy, move || {
            timed("clear_all", policy.timeout, store.clear_all())
        })
        .await?;
        debug!("🧹 store cleared, new generation begins");

        let worker_count = self.runtime.effective_worker_count();
        let accumulator = Arc::new(AccumulatorBackend::from_strategy(
            self.runtime.strategy,
            self.runtime.batch_size,
        ));
        let flusher = Arc::new(FlushCoordinator::new(Arc::clone(&self.store), policy));
        let (tx, rx) = async_channel::bounded(self.runtime.queue_capacity);
        let stop = StopSignal::default();

        info!(
            "🚀 loading with {worker_count} workers, strategy {}, batch size {}",
            self.runtime.strategy, self.runtime.batch_size
        );

        let source_handle = SourceWorker::new(source, tx, cancel, stop.clone()).start();
        let decode_handles: Vec<_> = (0..worker_count)
            .map(|id| {
                DecodeWorker::<PromotionCsv>::new(
                    id,
                    rx.clone(),
                    Arc::clone(&accumulator),
                    Arc::clone(&flusher),
                    self.runtime.decode_policy,
                    MAX_SAMPLE_ERRORS,
                    stop.clone(),
                )
                .start()
            })
            .collect();
        // -- the workers hold their own clones. ours would keep the channel open forever.
        drop(rx);

        let source_result = source_handle.await;
        let decode_results = join_all(decode_handles).await;

        let rows_read = source_result??;
        let mut tallies = Vec::with_capacity(decode_results.len());
        for result in decode_results {
            tallies.push(result??);
        }

        debug!("🧺 final flush of {} leftover entries", accumulator.pending());
        let leftovers = accumulator.drain();
        flusher.flush(leftovers).await?;

        let mut outcome = merge_tallies(tallies);
        outcome.rows_read = rows_read;
        outcome.flush = flusher.stats();
        Ok(outcome)
    }
}

/// 🧮 Add up every worker's tally. Samples are sorted by line so reports read top to bottom.
fn merge_tallies(tallies: Vec<DecodeTally>) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();
    for tally in tallies {
        outcome.rows_decoded += tally.decoded;
        outcome.rows_skipped += tally.skipped;
        outcome.sample_errors.extend(tally.samples);
    }
    outcome.sample_errors.sort_by_key(|err| err.line);
    outcome.sample_errors.truncate(MAX_SAMPLE_ERRORS);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{AccumulationStrategy, DecodePolicy};
    use crate::backends::InMemoryStore;
    use anyhow::Result;

    fn runtime(batch_size: usize, worker_count: usize) -> RuntimeConfig {
        RuntimeConfig {
            batch_size,
            worker_count,
            queue_capacity: 4,
            flush_backoff_ms: 1,
            ..RuntimeConfig::default()
        }
    }

    fn supervisor(runtime: RuntimeConfig) -> (Supervisor, InMemoryStore) {
        let store = InMemoryStore::new();
        let backend = Arc::new(StoreBackend::InMemory(store.clone()));
        (Supervisor::new(runtime, backend), store)
    }

    fn rows(n: usize) -> SourceBackend {
        SourceBackend::lines((0..n).map(|i| format!("P{i},{i}.5,2030-01-01")))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_25_rows_make_three_flushes() -> Result<()> {
        // 🧪 batch size 10, 25 rows, 8 workers: two full batches and a leftover of 5
        for strategy in [AccumulationStrategy::LockedMap, AccumulationStrategy::LockFree] {
            let (supervisor, store) = supervisor(RuntimeConfig {
                strategy,
                ..runtime(10, 8)
            });
            let outcome = supervisor.run(rows(25), CancelToken::new()).await?;

            let mut sizes = store.put_call_sizes().await;
            sizes.sort_unstable();
            assert_eq!(sizes, vec![5, 10, 10], "{strategy}");
            assert_eq!(outcome.flush.flush_calls, 3);
            assert_eq!(outcome.rows_read, 25);
            assert_eq!(outcome.rows_decoded, 25);
            assert_eq!(store.snapshot().await.len(), 25);
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_serial_still_gets_there() -> Result<()> {
        let (supervisor, store) = supervisor(RuntimeConfig {
            strategy: AccumulationStrategy::Serial,
            ..runtime(4, 16)
        });
        let outcome = supervisor.run(rows(9), CancelToken::new()).await?;
        assert_eq!(store.put_call_sizes().await, vec![4, 4, 1]);
        assert_eq!(outcome.rows_decoded, 9);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_fail_fast_skips_the_final_flush() {
        let (supervisor, store) = supervisor(RuntimeConfig {
            decode_policy: DecodePolicy::FailFast,
            ..runtime(10, 2)
        });
        let source = SourceBackend::lines(["A,10.0,2025-01-01", "B,notanumber,2025-02-02"]);
        let err = supervisor
            .run(source, CancelToken::new())
            .await
            .expect_err("bad row must fail the load");

        match err {
            LoadError::Decode(decode) => assert_eq!(decode.line, 2),
            other => panic!("expected a decode error, got {other:?}"),
        }
        assert!(store.snapshot().await.is_empty());
        assert_eq!(store.clear_calls(), 1);
    }

    #[tokio::test]
    async fn the_one_where_a_cancelled_token_never_clears_the_store() {
        let (supervisor, store) = supervisor(runtime(10, 2));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = supervisor
            .run(rows(5), cancel)
            .await
            .expect_err("cancelled before the first row");
        assert!(matches!(err, LoadError::Cancelled { rows_read: 0 }));
        assert_eq!(store.clear_calls(), 0);
    }

    #[tokio::test]
    async fn the_one_where_skipped_samples_are_capped_and_sorted() -> Result<()> {
        let (supervisor, _store) = supervisor(runtime(100, 4));
        let source = SourceBackend::lines((0..15).map(|i| format!("X{i},nope,2030-01-01")));
        let outcome = supervisor.run(source, CancelToken::new()).await?;

        assert_eq!(outcome.rows_skipped, 15);
        assert_eq!(outcome.sample_errors.len(), MAX_SAMPLE_ERRORS);
        let lines: Vec<u64> = outcome.sample_errors.iter().map(|e| e.line).collect();
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        assert_eq!(lines, sorted);
        Ok(())
    }
}
