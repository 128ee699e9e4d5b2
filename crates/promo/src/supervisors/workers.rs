//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all
//! the credit in the sprint retro.
//!
//! 🚀 This module is like a factory floor, except instead of hard hats
//! we wear `#[derive(Debug)]` and instead of OSHA violations
//! we have borrow checker violations. 🦆
//!
//! Two kinds of minion live here:
//! - [`SourceWorker`]: one of these per load. Reads rows, pushes them into the channel.
//! - [`DecodeWorker`]: a pool of these. Pulls rows, decodes, accumulates, flushes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::errors::LoadError;

mod decode_worker;
mod source_worker;

pub(in crate::supervisors) use decode_worker::{DecodeTally, DecodeWorker};
pub(in crate::supervisors) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" — Seinfeld, on Rust
pub(in crate::supervisors) trait Worker {
    /// What the worker hands back when it finishes without drama.
    type Output: Send + 'static;

    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<Self::Output, LoadError>>;
}

/// 🚨 The per-load "everybody stop" flag. Raised by whichever worker fails first.
#[derive(Debug, Clone, Default)]
pub(in crate::supervisors) struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub(in crate::supervisors) fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(in crate::supervisors) fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
