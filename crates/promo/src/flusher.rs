// ai
//! 🚽 The FlushCoordinator — one door to the store, and only one batch goes through at a time.
//!
//! 🎬 *[a worker arrives with a full batch. the door is closed. it waits.]*
//! *[the door opens. put_many. the store nods. the door closes again.]*
//! *[somewhere behind it, another batch is already in line.]*
//!
//! Every claimed batch (and the leftovers at the end) comes through [`FlushCoordinator::flush`].
//! Each store call is held to a deadline, failures get retried with backoff, and the
//! write gate makes sure two flushes never talk to the store over each other.
//!
//! ## Knowledge Graph 🧠
//! - Called by: `supervisors::workers::decode_worker` (full batches), `supervisors` (final drain)
//! - Calls: `backends::Store::put_many` via `retry::{timed, retry_with_backoff}`
//! - Counters feed `service::LoadReport`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::accumulators::Batch;
use crate::backends::{Store, StoreBackend};
use crate::errors::StoreError;
use crate::retry::{StorePolicy, retry_with_backoff, timed};

/// 📊 What the coordinator did during one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FlushStats {
    /// Successful `put_many` calls. Retries of the same batch count once.
    pub(crate) flush_calls: u64,
    /// Accepted records across every flushed batch, duplicates included.
    pub(crate) records_flushed: u64,
    /// Distinct entries sent to the store.
    pub(crate) entries_written: u64,
}

#[derive(Debug)]
pub(crate) struct FlushCoordinator {
    store: Arc<StoreBackend>,
    policy: StorePolicy,
    /// 🚪 The write gate. Held for the whole put_many, retries included.
    write_gate: Mutex<()>,
    flush_calls: AtomicU64,
    records_flushed: AtomicU64,
    entries_written: AtomicU64,
}

impl FlushCoordinator {
    pub(crate) fn new(store: Arc<StoreBackend>, policy: StorePolicy) -> Self {
        Self {
            store,
            policy,
            write_gate: Mutex::new(()),
            flush_calls: AtomicU64::new(0),
            records_flushed: AtomicU64::new(0),
            entries_written: AtomicU64::new(0),
        }
    }

    /// 🚽 Write one batch to the store. Empty batches are a no-op, not a store call.
    pub(crate) async fn flush(&self, batch: Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let _gate = self.write_gate.lock().await;
        let store = &self.store;
        let entries = batch.entries();
        let timeout = self.policy.timeout;
        retry_with_backoff("put_many", &self.policy, move || {
            timed("put_many", timeout, store.put_many(entries))
        })
        .await?;

        self.flush_calls.fetch_add(1, Ordering::Relaxed);
        self.records_flushed
            .fetch_add(batch.records() as u64, Ordering::Relaxed);
        self.entries_written
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        debug!(
            "🚽 flushed {} entries ({} records)",
            batch.len(),
            batch.records()
        );
        Ok(())
    }

    pub(crate) fn stats(&self) -> FlushStats {
        FlushStats {
            flush_calls: self.flush_calls.load(Ordering::Relaxed),
            records_flushed: self.records_flushed.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
        }
    }
}
