//! ⚡ The lock-free accumulator. No mutex, just a queue and a counter that argue politely.
//!
//! 🎬 *[eight workers push into the same queue. none of them wait.]*
//! *[a counter ticks. on every multiple of B, exactly one worker hears the bell.]*
//!
//! ## How the claim works 🧠
//! 1. Push the promotion into an unbounded MPMC queue.
//! 2. Bump the counter. The push happened first, so the counter never runs ahead of the queue.
//! 3. Whoever's bump lands exactly on a multiple of `batch_size` pops `batch_size`
//!    items and owns that batch. Everyone else goes back to work.
//!
//! Every earlier claim also popped exactly `batch_size`, so by the time the k-th
//! claimer shows up at least `k * batch_size` items were pushed and at most
//! `(k - 1) * batch_size` were taken. The claimer never finds the queue short.
//! The items it pops might be someone else's. Nobody minds. They're all promotions.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_channel::{Receiver, Sender};
use tracing::error;

use crate::accumulators::{Accumulator, Batch};
use crate::common::Promotion;

#[derive(Debug)]
pub(crate) struct LockFreeAccumulator {
    batch_size: usize,
    tx: Sender<Promotion>,
    rx: Receiver<Promotion>,
    pushed: AtomicUsize,
}

impl LockFreeAccumulator {
    pub(crate) fn new(batch_size: usize) -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            batch_size: batch_size.max(1),
            tx,
            rx,
            pushed: AtomicUsize::new(0),
        }
    }

    /// 🎣 Pop up to `limit` items into a fresh batch.
    fn take(&self, limit: usize) -> Batch {
        let mut batch = Batch::with_capacity(limit.min(self.batch_size));
        while batch.records() < limit {
            match self.rx.try_recv() {
                Ok(promotion) => batch.insert(promotion),
                Err(_) => break,
            }
        }
        batch
    }
}

impl Accumulator for LockFreeAccumulator {
    fn push(&self, promotion: Promotion) -> Option<Batch> {
        if let Err(rejected) = self.tx.try_send(promotion) {
            // -- unbounded and never closed while we hold both ends. if that ever stops being
            // -- true, the rejected promotion goes out as its own batch rather than nowhere.
            let promotion = rejected.into_inner();
            debug_assert!(false, "lock-free queue rejected promotion '{}'", promotion.id);
            error!("💀 lock-free queue rejected promotion '{}', flushing it alone", promotion.id);
            let mut batch = Batch::with_capacity(1);
            batch.insert(promotion);
            return Some(batch);
        }

        let count = self.pushed.fetch_add(1, Ordering::AcqRel) + 1;
        if count % self.batch_size == 0 {
            Some(self.take(self.batch_size))
        } else {
            None
        }
    }

    fn drain(&self) -> Batch {
        self.take(usize::MAX)
    }

    fn pending(&self) -> usize {
        self.rx.len()
    }
}
