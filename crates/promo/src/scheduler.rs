//! ⏰ The periodic trigger. Reloads the cache every so often, forever, politely.
//!
//! First tick fires right away, then every `every`. A tick that lands while a
//! reload is still running is skipped, not queued. A failed reload is logged and
//! forgotten; the next tick tries again. Nothing here ever propagates an error,
//! because there is nobody upstream to catch it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::errors::LoadError;
use crate::service::PromotionCache;

/// ⏰ Spawn the reload loop. It runs until `cancel` fires.
///
/// 💀 A zero `every` is refused up front; tokio's interval would panic on it.
pub fn spawn_periodic_reload(
    cache: Arc<PromotionCache>,
    every: Duration,
    cancel: CancelToken,
) -> anyhow::Result<JoinHandle<()>> {
    ensure!(!every.is_zero(), "💀 the reload interval must be longer than zero");
    Ok(tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("⏰ periodic reload every {every:?}");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("🛑 periodic reload stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match cache.try_reload_with(None, cancel.clone()).await {
                Ok(report) => debug!(
                    "⏰ scheduled reload #{} done: {}",
                    report.generation,
                    report.message()
                ),
                Err(LoadError::ReloadInProgress) => {
                    warn!("⏰ a reload is already running, skipping this tick")
                }
                Err(LoadError::Cancelled { .. }) => {
                    info!("🛑 scheduled reload cancelled");
                }
                Err(err) => error!("💀 scheduled reload failed, will retry next tick: {err}"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{AppConfig, RuntimeConfig, SourceConfig, StoreConfig};
    use crate::backends::{InMemorySourceConfig, InMemoryStore, StoreBackend};

    fn cache(store: InMemoryStore, flush_max_retries: u32) -> anyhow::Result<Arc<PromotionCache>> {
        let config = AppConfig {
            source_config: SourceConfig::InMemory(InMemorySourceConfig {
                rows: vec!["A,10.0,2025-01-01".to_string()],
            }),
            store_config: StoreConfig::InMemory,
            runtime: RuntimeConfig {
                batch_size: 10,
                worker_count: 2,
                flush_max_retries,
                ..RuntimeConfig::default()
            },
        };
        Ok(Arc::new(PromotionCache::new(config, StoreBackend::InMemory(store))?))
    }

    /// ⏳ Yield (without letting the paused clock move) until `n` writes have landed.
    async fn wait_for_puts(store: &InMemoryStore, n: usize) {
        for _ in 0..10_000 {
            if store.put_call_sizes().await.len() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("💀 the store never saw {n} writes");
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_clock_strikes_and_the_cache_reloads() -> anyhow::Result<()> {
        let store = InMemoryStore::new();
        let cache = cache(store.clone(), 3)?;
        let cancel = CancelToken::new();
        let handle =
            spawn_periodic_reload(Arc::clone(&cache), Duration::from_secs(1800), cancel.clone())?;

        // 🧪 first tick is immediate
        wait_for_puts(&store, 1).await;
        assert_eq!(cache.generation(), 1);

        // 🧪 half an hour later, again
        tokio::time::advance(Duration::from_secs(1800)).await;
        wait_for_puts(&store, 2).await;
        assert_eq!(cache.generation(), 2);
        assert_eq!(store.clear_calls(), 2);

        cancel.cancel();
        handle.await?;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_failed_reload_does_not_stop_the_clock() -> anyhow::Result<()> {
        // 🧪 the store refuses every write and retries are off. the loop shrugs and keeps ticking.
        let store = InMemoryStore::new();
        store.fail_next_puts(usize::MAX);
        let cache = cache(store.clone(), 0)?;
        let cancel = CancelToken::new();
        let handle =
            spawn_periodic_reload(Arc::clone(&cache), Duration::from_secs(60), cancel.clone())?;

        for attempt in 1..=3 {
            for _ in 0..10_000 {
                if store.put_attempts() >= attempt {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert_eq!(cache.generation(), attempt as u64);
            tokio::time::advance(Duration::from_secs(60)).await;
        }

        cancel.cancel();
        handle.await?;
        assert!(store.snapshot().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_zero_interval_is_refused() -> anyhow::Result<()> {
        // 🧪 interval(0) would panic inside tokio. we say no before spawning anything.
        let store = InMemoryStore::new();
        let cache = cache(store.clone(), 0)?;
        let err = spawn_periodic_reload(cache, Duration::ZERO, CancelToken::new())
            .expect_err("zero interval must be refused");
        assert!(err.to_string().contains("interval"));
        assert_eq!(store.clear_calls(), 0, "no reload ever ran");
        Ok(())
    }
}
