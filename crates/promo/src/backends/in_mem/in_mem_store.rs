use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::backends::Store;
use crate::common::Promotion;

/// 📦 A store that never forgets. Unlike my dad, who forgot my soccer game in 1998.
///
/// The promotions live in a `HashMap` behind an async `RwLock`. `put_many` takes the
/// write lock once for the whole batch, so a reader sees all of it or none of it.
///
/// Clone-able because tests need to peek inside after handing a copy off to the
/// engine. Every field is an `Arc`, so everyone shares the same map and the same
/// tattletale counters. Communist data, but in a good way.
///
/// 🧪 Test knobs:
/// - [`fail_next_puts`](Self::fail_next_puts): the next N `put_many` calls fail.
/// - [`with_put_delay`](Self::with_put_delay): every `put_many` sleeps first.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    data: Arc<RwLock<HashMap<String, Promotion>>>,
    /// 🔒 The evidence locker. One entry per successful `put_many`: the batch size.
    put_calls: Arc<Mutex<Vec<usize>>>,
    put_attempts: Arc<AtomicUsize>,
    clear_calls: Arc<AtomicUsize>,
    failing_puts: Arc<AtomicUsize>,
    put_delay: Duration,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🐌 Every `put_many` naps for `delay` before writing.
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = delay;
        self
    }

    /// 💥 Make the next `count` `put_many` calls fail. Shared with every clone.
    pub fn fail_next_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// 📸 A copy of everything currently stored.
    pub async fn snapshot(&self) -> HashMap<String, Promotion> {
        self.data.read().await.clone()
    }

    /// Sizes of every successful `put_many`, in the order they landed.
    pub async fn put_call_sizes(&self) -> Vec<usize> {
        self.put_calls.lock().await.clone()
    }

    /// Every `put_many` call, failed ones included.
    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    /// Consume one injected failure, if any are left.
    fn take_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn clear_all(&self) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.data.write().await.clear();
        Ok(())
    }

    async fn put_many(&self, entries: &HashMap<String, Promotion>) -> Result<()> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.put_delay.is_zero() {
            tokio::time::sleep(self.put_delay).await;
        }
        if self.take_failure() {
            bail!("💥 injected put_many failure ({} entries)", entries.len());
        }

        // 🔒 one write lock for the whole batch. readers see all of it or none of it.
        let mut data = self.data.write().await;
        data.extend(entries.iter().map(|(id, promo)| (id.clone(), promo.clone())));
        drop(data);

        self.put_calls.lock().await.push(entries.len());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Promotion>> {
        Ok(self.data.read().await.get(id).cloned())
    }
}
