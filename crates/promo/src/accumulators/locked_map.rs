//! 🔒 One map, one mutex, no surprises.
//!
//! Insert and the size check happen under the same lock, so whoever's insert
//! tips the map over `batch_size` walks away with the whole thing and leaves an
//! empty map behind. Nothing async happens while the `std::sync::Mutex` is held;
//! the flush runs after it is released.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::accumulators::{Accumulator, Batch};
use crate::common::Promotion;

#[derive(Debug)]
pub(crate) struct LockedMapAccumulator {
    batch_size: usize,
    pending: Mutex<Batch>,
}

impl LockedMapAccumulator {
    pub(crate) fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            pending: Mutex::new(Batch::with_capacity(batch_size)),
        }
    }

    /// 🧯 A worker that panicked mid-insert poisons the lock. The map is still
    /// consistent (insert either happened or it didn't), so we keep going.
    fn lock(&self) -> MutexGuard<'_, Batch> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Accumulator for LockedMapAccumulator {
    fn push(&self, promotion: Promotion) -> Option<Batch> {
        let mut pending = self.lock();
        pending.insert(promotion);
        if pending.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut *pending,
                Batch::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    fn drain(&self) -> Batch {
        std::mem::take(&mut *self.lock())
    }

    fn pending(&self) -> usize {
        self.lock().len()
    }
}
