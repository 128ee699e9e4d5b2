// ai
//! 🏪 The PromotionCache — the front desk. Reloads go in, lookups come out.
//!
//! 🎬 INT. FRONT DESK — 9:00 AM
//!
//! The timer wants a reload. An upload wants a reload. Both arrive in the same
//! millisecond. The desk clerk points at the sign: ONE RELOAD AT A TIME. The timer
//! is told to come back next tick. The upload takes a number and waits.
//!
//! Lookups never queue. They go straight to the store, so during a reload they
//! might see the old generation, an empty store, or half of the new one. That's
//! the deal. Nobody promised snapshots.
//!
//! ## Knowledge Graph 🧠
//! - `reload*` → single-flight gate → `supervisors::Supervisor::run` → [`LoadReport`]
//! - `get` → `backends::Store::get` under a deadline, no retry
//! - Used by: `scheduler::spawn_periodic_reload`, the `promo` CLI

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::app_config::{AccumulationStrategy, AppConfig, RuntimeConfig};
use crate::backends::{SourceBackend, Store, StoreBackend};
use crate::cancel::CancelToken;
use crate::common::Promotion;
use crate::errors::{DecodeError, LoadError, StoreError};
use crate::retry::timed;
use crate::supervisors::{LoadOutcome, Supervisor};

/// ✅ What a successful reload returns to whoever asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    /// Which reload this was, counting from 1 since the process started.
    pub generation: u64,
    pub rows_read: u64,
    pub rows_decoded: u64,
    pub rows_skipped: u64,
    /// Up to ten skipped rows, lowest line first.
    pub sample_errors: Vec<DecodeError>,
    pub flush_calls: u64,
    pub records_flushed: u64,
    /// Distinct ids written. Lower than `records_flushed` when the input repeats itself.
    pub entries_written: u64,
    pub elapsed: Duration,
    pub strategy: AccumulationStrategy,
}

impl LoadReport {
    pub const SUCCESS_MESSAGE: &'static str = "Promotions loaded successfully";

    fn new(
        generation: u64,
        outcome: LoadOutcome,
        elapsed: Duration,
        strategy: AccumulationStrategy,
    ) -> Self {
        Self {
            generation,
            rows_read: outcome.rows_read,
            rows_decoded: outcome.rows_decoded,
            rows_skipped: outcome.rows_skipped,
            sample_errors: outcome.sample_errors,
            flush_calls: outcome.flush.flush_calls,
            records_flushed: outcome.flush.records_flushed,
            entries_written: outcome.flush.entries_written,
            elapsed,
            strategy,
        }
    }

    pub fn message(&self) -> &'static str {
        Self::SUCCESS_MESSAGE
    }
}

/// 🏪 The cache facade. Share it behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct PromotionCache {
    config: AppConfig,
    store: Arc<StoreBackend>,
    /// 🚦 Held for the whole duration of a reload. One at a time, no exceptions.
    reload_gate: Mutex<()>,
    generation: AtomicU64,
}

impl PromotionCache {
    /// 🏗️ Build the cache around an already-connected store.
    ///
    /// 💀 Rejects a runtime with a zero count in it, the same way `load_config` does,
    /// so a hand-built config can't sneak a zero-capacity queue past the front desk.
    pub fn new(config: AppConfig, store: StoreBackend) -> anyhow::Result<Self> {
        config.runtime.validate()?;
        Ok(Self {
            config,
            store: Arc::new(store),
            reload_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    /// 🔌 Connect to the configured store and build the cache around it.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        config.runtime.validate()?;
        let store = StoreBackend::from_config(&config.store_config).await?;
        Self::new(config, store)
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.config.runtime
    }

    pub fn store(&self) -> &StoreBackend {
        &self.store
    }

    /// Reloads started so far, failed ones included.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 🔄 Reload from the configured default source. Waits if another reload is running.
    pub async fn reload(&self) -> Result<LoadReport, LoadError> {
        self.reload_with(None, CancelToken::new()).await
    }

    /// 🔄 Reload from `source`, or the configured default when `None`.
    /// Waits for any in-progress reload to finish first.
    pub async fn reload_with(
        &self,
        source: Option<SourceBackend>,
        cancel: CancelToken,
    ) -> Result<LoadReport, LoadError> {
        let _gate = self.reload_gate.lock().await;
        self.run_reload(source, cancel).await
    }

    /// 🚦 Like [`reload_with`](Self::reload_with), but refuses with
    /// [`LoadError::ReloadInProgress`] instead of waiting.
    pub async fn try_reload_with(
        &self,
        source: Option<SourceBackend>,
        cancel: CancelToken,
    ) -> Result<LoadReport, LoadError> {
        let Ok(_gate) = self.reload_gate.try_lock() else {
            return Err(LoadError::ReloadInProgress);
        };
        self.run_reload(source, cancel).await
    }

    /// 🔍 Look up one promotion. `Ok(None)` is a miss, `Err` is the store having a bad day.
    pub async fn get(&self, id: &str) -> Result<Option<Promotion>, StoreError> {
        let timeout = self.config.runtime.store_policy().timeout;
        timed("get", timeout, self.store.get(id)).await
    }

    async fn run_reload(
        &self,
        source: Option<SourceBackend>,
        cancel: CancelToken,
    ) -> Result<LoadReport, LoadError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        info!("🔄 reload #{generation} starting");

        let result = self.load_generation(source, cancel).await;
        let elapsed = started.elapsed();
        match result {
            Ok(outcome) => {
                let report =
                    LoadReport::new(generation, outcome, elapsed, self.config.runtime.strategy);
                info!(
                    "✅ reload #{generation}: {} ({} rows, {} entries, {} skipped, {} flushes) in {elapsed:?}",
                    report.message(),
                    report.rows_read,
                    report.entries_written,
                    report.rows_skipped,
                    report.flush_calls
                );
                Ok(report)
            }
            Err(err) => {
                error!("💀 reload #{generation} failed after {elapsed:?}: {err}");
                Err(err)
            }
        }
    }

    async fn load_generation(
        &self,
        source: Option<SourceBackend>,
        cancel: CancelToken,
    ) -> Result<LoadOutcome, LoadError> {
        let source = match source {
            Some(source) => source,
            None => SourceBackend::from_config(&self.config.source_config)
                .await
                .map_err(LoadError::from_source)?,
        };
        Supervisor::new(self.config.runtime.clone(), Arc::clone(&self.store))
            .run(source, cancel)
            .await
    }
}
