//! 🔄 Timeouts and retry-with-backoff for store calls.
//!
//! Every store round trip gets a deadline. Writes that miss it (or fail outright)
//! get a few more chances, each one waiting twice as long as the last, before the
//! whole load is declared a loss.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error};

use crate::errors::StoreError;

/// ⏱️ Upper bound for a single backoff sleep, no matter how many attempts deep we are.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 🔧 How patient to be with the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePolicy {
    /// Deadline for one store call.
    pub timeout: Duration,
    /// Extra attempts after the first failure. 0 = fail on first error.
    pub max_retries: u32,
    /// Sleep before the first retry; doubles each time.
    pub backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Exponential backoff: base, 2×base, 4×base, ... capped at [`MAX_BACKOFF`].
/// `attempt` is 1-based.
pub fn backoff_duration(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// ⏱️ Run one store call under a deadline, turning both the timeout and the
/// backend's `anyhow` error into a [`StoreError`].
pub(crate) async fn timed<T>(
    op: &'static str,
    timeout: Duration,
    call: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(StoreError::backend(op, err)),
        Err(_elapsed) => Err(StoreError::Timeout { op, timeout }),
    }
}

/// 🔄 Retry a store call with exponential backoff.
///
/// Returns the first success, or the last error once retries run out
/// (or the error says it is not worth retrying).
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    op: &'static str,
    policy: &StorePolicy,
    mut attempt_fn: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0u32;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && err.is_retryable() => {
                attempt += 1;
                let pause = backoff_duration(policy.backoff, attempt);
                debug!(
                    "🔄 {op}: attempt {attempt}/{} failed: {err}, retrying in {pause:?}",
                    policy.max_retries
                );
                tokio::time::sleep(pause).await;
            }
            Err(err) => {
                error!("💀 {op}: failed permanently: {err}");
                return Err(err);
            }
        }
    }
}
