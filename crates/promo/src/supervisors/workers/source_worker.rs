//! 🚰 The SourceWorker: one reader, one direction, no take-backs.
//!
//! Pulls rows from the source and pushes them into the bounded channel. When the
//! channel is full, `send` waits, and that wait is the whole backpressure story.
//! Checks the cancel token before every row, and stops quietly when the decode
//! side has already given up.

use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{StopSignal, Worker};
use crate::backends::{Source, SourceBackend};
use crate::cancel::CancelToken;
use crate::common::RawRow;
use crate::errors::LoadError;

#[derive(Debug)]
pub(in crate::supervisors) struct SourceWorker {
    source: SourceBackend,
    tx: Sender<RawRow>,
    cancel: CancelToken,
    stop: StopSignal,
}

impl SourceWorker {
    pub(in crate::supervisors) fn new(
        source: SourceBackend,
        tx: Sender<RawRow>,
        cancel: CancelToken,
        stop: StopSignal,
    ) -> Self {
        Self {
            source,
            tx,
            cancel,
            stop,
        }
    }

    /// 💀 Tell the decode side it's over, then hand the error back.
    fn abort(&self, err: LoadError) -> LoadError {
        self.stop.raise();
        self.tx.close();
        err
    }
}

impl Worker for SourceWorker {
    /// Rows handed to the decode workers.
    type Output = u64;

    fn start(mut self) -> JoinHandle<Result<u64, LoadError>> {
        tokio::spawn(async move {
            let mut rows_read = 0u64;
            loop {
                if self.cancel.is_cancelled() {
                    info!("🛑 SourceWorker: cancelled after {rows_read} rows");
                    return Err(self.abort(LoadError::Cancelled { rows_read }));
                }
                if self.stop.is_raised() {
                    debug!("🚨 SourceWorker: a decode worker failed, not reading any further");
                    break;
                }

                let row = match self.source.next_row().await {
                    Ok(Some(row)) => row,
                    Ok(None) => break,
                    Err(err) => return Err(self.abort(LoadError::from_source(err))),
                };
                rows_read += 1;

                if self.tx.send(row).await.is_err() {
                    // -- the receivers closed the channel. somebody else owns the error.
                    debug!("🚪 SourceWorker: channel closed after {rows_read} rows");
                    break;
                }
            }
            debug!("🏁 SourceWorker: done, {rows_read} rows submitted");
            Ok(rows_read)
        })
    }
}
