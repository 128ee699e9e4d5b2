//! 🎬 *[a channel fills with rows. somewhere, a pool of decoders waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for forty million promotions. and yet, here we are.]*
//!
//! 🔄 The DecodeWorker pulls a row, decodes it, drops it in the accumulator, and
//! if the accumulator hands back a full batch, carries it to the flusher itself.
//! Every row is received by exactly one worker, so every row is decoded exactly once.

use std::marker::PhantomData;
use std::sync::Arc;

use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{StopSignal, Worker};
use crate::accumulators::{Accumulator, AccumulatorBackend};
use crate::app_config::DecodePolicy;
use crate::common::RawRow;
use crate::errors::{DecodeError, LoadError};
use crate::flusher::FlushCoordinator;
use crate::transforms::RowDecoder;

/// 🚨 Raises the stop flag and closes the queue if the worker unwinds.
///
/// The panic itself only shows up as `LoadError::Worker` at join time. The reader
/// has to hear about it sooner.
struct StopOnPanic {
    stop: StopSignal,
    rx: Receiver<RawRow>,
}

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.stop.raise();
            self.rx.close();
        }
    }
}

/// 🧮 One worker's tally for the load report.
#[derive(Debug, Default)]
pub(in crate::supervisors) struct DecodeTally {
    pub(in crate::supervisors) decoded: u64,
    pub(in crate::supervisors) skipped: u64,
    /// First few skipped rows, for the humans.
    pub(in crate::supervisors) samples: Vec<DecodeError>,
}

impl DecodeTally {
    fn record_skip(&mut self, err: DecodeError, max_samples: usize) {
        self.skipped += 1;
        if self.samples.len() < max_samples {
            self.samples.push(err);
        }
    }
}

#[derive(Debug)]
pub(in crate::supervisors) struct DecodeWorker<D> {
    id: usize,
    rx: Receiver<RawRow>,
    accumulator: Arc<AccumulatorBackend>,
    flusher: Arc<FlushCoordinator>,
    policy: DecodePolicy,
    max_samples: usize,
    stop: StopSignal,
    decoder: PhantomData<D>,
}

impl<D> DecodeWorker<D> {
    pub(in crate::supervisors) fn new(
        id: usize,
        rx: Receiver<RawRow>,
        accumulator: Arc<AccumulatorBackend>,
        flusher: Arc<FlushCoordinator>,
        policy: DecodePolicy,
        max_samples: usize,
        stop: StopSignal,
    ) -> Self {
        Self {
            id,
            rx,
            accumulator,
            flusher,
            policy,
            max_samples,
            stop,
            decoder: PhantomData,
        }
    }

    /// 💀 Raise the flag, slam the channel shut, and hand back the error.
    fn abort(&self, err: LoadError) -> LoadError {
        self.stop.raise();
        self.rx.close();
        err
    }
}

impl<D> Worker for DecodeWorker<D>
where
    D: RowDecoder + Send + Sync + 'static,
{
    type Output = DecodeTally;

    fn start(self) -> JoinHandle<Result<DecodeTally, LoadError>> {
        tokio::spawn(async move {
            let _stop_on_panic = StopOnPanic {
                stop: self.stop.clone(),
                rx: self.rx.clone(),
            };
            let mut tally = DecodeTally::default();
            // -- recv keeps handing out queued rows after a close, so the flag is checked per row
            while let Ok(row) = self.rx.recv().await {
                if self.stop.is_raised() {
                    debug!("🚨 DecodeWorker {}: stop raised, abandoning the queue", self.id);
                    break;
                }

                match D::decode(&row) {
                    Ok(promotion) => {
                        tally.decoded += 1;
                        if let Some(batch) = self.accumulator.push(promotion) {
                            debug!(
                                "📦 DecodeWorker {} claimed a batch of {}",
                                self.id,
                                batch.len()
                            );
                            if let Err(err) = self.flusher.flush(batch).await {
                                return Err(self.abort(err.into()));
                            }
                        }
                    }
                    Err(err) => match self.policy {
                        DecodePolicy::Skip => {
                            warn!("⚠️ skipping malformed {err}");
                            tally.record_skip(err, self.max_samples);
                        }
                        DecodePolicy::FailFast => {
                            warn!("💀 malformed {err}, failing the load");
                            return Err(self.abort(err.into()));
                        }
                    },
                }
            }
            debug!(
                "🏁 DecodeWorker {}: {} decoded, {} skipped",
                self.id, tally.decoded, tally.skipped
            );
            Ok(tally)
        })
    }
}
