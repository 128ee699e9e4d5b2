// ai
//! 🧺 Accumulators — where decoded promotions wait for their ride to the store.
//!
//! 🎬 *[forty workers. one basket. everybody reaching in at once.]*
//! *["Is it full yet?" "I think so." "Did you flush it?" "I thought YOU flushed it."]*
//! *[that conversation is the bug this module exists to prevent.]*
//!
//! Every accumulator makes the same promise: each pushed promotion ends up in
//! exactly one [`Batch`]. Either a push returns a full batch it claimed (and the
//! caller flushes it), or the entry stays put until [`Accumulator::drain`] hands
//! the leftovers to the final flush. Nobody gets flushed twice. Nobody gets lost.
//!
//! ## Knowledge Graph 🧠
//! - Pattern: trait → concrete impls (LockedMap, LockFree) → `AccumulatorBackend` enum
//! - Selected by `RuntimeConfig::strategy` via [`AccumulatorBackend::from_strategy`]
//! - Claimed batches go to `flusher::FlushCoordinator::flush`

use std::collections::HashMap;

use crate::app_config::AccumulationStrategy;
use crate::common::Promotion;

pub(crate) mod lock_free;
pub(crate) mod locked_map;

pub(crate) use lock_free::LockFreeAccumulator;
pub(crate) use locked_map::LockedMapAccumulator;

/// 📦 A group of promotions headed to the store in one `put_many`.
///
/// `entries` is keyed by id, so duplicates inside one batch collapse to the last one
/// pushed. `records` still counts every push, so the books balance at the end of a load.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    pub(crate) entries: HashMap<String, Promotion>,
    pub(crate) records: usize,
}

impl Batch {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            records: 0,
        }
    }

    pub(crate) fn insert(&mut self, promotion: Promotion) {
        self.records += 1;
        self.entries.insert(promotion.id.clone(), promotion);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct ids in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Pushes this batch represents, duplicates included.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn entries(&self) -> &HashMap<String, Promotion> {
        &self.entries
    }
}

/// 🧺 Thread-safe holding pen for decoded promotions.
///
/// # Contract 📜
/// - `push` is called concurrently by every decode worker.
/// - `push` returns `Some(batch)` to exactly one caller per full batch. That caller owns the flush.
/// - `drain` is called once, after every worker has joined, to collect the leftovers.
pub(crate) trait Accumulator: std::fmt::Debug + Send + Sync {
    fn push(&self, promotion: Promotion) -> Option<Batch>;
    fn drain(&self) -> Batch;
    /// Entries currently waiting. Racy by nature; for logs, not for decisions.
    fn pending(&self) -> usize;
}

/// 🎭 The many faces of an accumulator. Dispatches to whichever strategy config picked.
#[derive(Debug)]
pub(crate) enum AccumulatorBackend {
    LockedMap(LockedMapAccumulator),
    LockFree(LockFreeAccumulator),
}

impl AccumulatorBackend {
    /// 🔧 `Serial` runs one worker over the locked map, so it shares that accumulator.
    pub(crate) fn from_strategy(strategy: AccumulationStrategy, batch_size: usize) -> Self {
        match strategy {
            AccumulationStrategy::LockedMap | AccumulationStrategy::Serial => {
                Self::LockedMap(LockedMapAccumulator::new(batch_size))
            }
            AccumulationStrategy::LockFree => Self::LockFree(LockFreeAccumulator::new(batch_size)),
        }
    }
}

impl Accumulator for AccumulatorBackend {
    fn push(&self, promotion: Promotion) -> Option<Batch> {
        match self {
            Self::LockedMap(acc) => acc.push(promotion),
            Self::LockFree(acc) => acc.push(promotion),
        }
    }

    fn drain(&self) -> Batch {
        match self {
            Self::LockedMap(acc) => acc.drain(),
            Self::LockFree(acc) => acc.drain(),
        }
    }

    fn pending(&self) -> usize {
        match self {
            Self::LockedMap(acc) => acc.pending(),
            Self::LockFree(acc) => acc.pending(),
        }
    }
}
