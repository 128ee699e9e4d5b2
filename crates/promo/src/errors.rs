//! 💀 Errors — the many ways a reload can ruin your afternoon.
//!
//! The backends talk `anyhow` among themselves (it's duct tape, it's fine). At the
//! edge of the engine those get sorted into typed buckets so callers can tell a
//! malformed row from a dead store from a second reload that showed up uninvited.
//!
//! ```text
//!   LoadError
//!   ├── Source     the stream refused to open, or died mid-read
//!   ├── Decode     a row was not a promotion (fatal only under fail_fast)
//!   ├── Store      clear/put failed after every retry
//!   ├── Cancelled  somebody pulled the plug between rows
//!   ├── ReloadInProgress   single-flight said no
//!   └── Worker     a task panicked. we don't talk about it.
//! ```

use std::time::Duration;

use thiserror::Error;

/// 📦 Boxed error source. `anyhow::Error` converts into this for free.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 🔍 Why a row could not become a [`crate::Promotion`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeReason {
    #[error("expected 3 fields, found {found}")]
    FieldCount { found: usize },
    #[error("id is empty")]
    EmptyId,
    #[error("price '{value}' is not a number")]
    InvalidPrice { value: String },
    #[error("price '{value}' is negative")]
    NegativePrice { value: String },
}

/// 📄 A row that failed to decode, with enough context to find it in the file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {line} ('{row}'): {reason}")]
pub struct DecodeError {
    /// 1-based line number of the offending row.
    pub line: u64,
    /// The row text, verbatim.
    pub row: String,
    pub reason: DecodeReason,
}

/// 🧱 A store call that did not work out.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call '{op}' timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },
    #[error("store call '{op}' failed: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub(crate) fn backend(op: &'static str, err: anyhow::Error) -> Self {
        Self::Backend {
            op,
            source: err.into(),
        }
    }

    /// Timeouts and backend failures are both worth another try. A lookup caller
    /// gets to decide for itself; the flush path retries with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Backend { .. } => true,
        }
    }
}

/// 🚨 Everything that can end a reload early.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source failed: {0}")]
    Source(BoxError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("load cancelled after {rows_read} rows")]
    Cancelled { rows_read: u64 },
    #[error("a reload is already in progress")]
    ReloadInProgress,
    #[error("worker task failed to join: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl LoadError {
    pub(crate) fn from_source(err: anyhow::Error) -> Self {
        Self::Source(err.into())
    }
}
