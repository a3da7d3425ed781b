//! Fixed-delay retry for outbound requests.
//!
//! Every attempt is bounded by its own timeout. Transport failures and timeouts
//! are retried after `delay` with no attempt limit; any other error is
//! returned to the caller.

use crate::error::{IndexerError, Result};
use log::warn;
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(5_000);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300_000);

    /// Delay used by the price and metadata lookups.
    pub const FAST_DELAY: Duration = Duration::from_millis(1_000);

    pub fn fast() -> Self {
        Self { delay: Self::FAST_DELAY, ..Self::default() }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { delay: Self::DEFAULT_DELAY, timeout: Self::DEFAULT_TIMEOUT }
    }
}

pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, what: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0u64;
    loop {
        attempts += 1;
        let error = match timeout(policy.timeout, operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_retryable() => return Err(e),
            Ok(Err(e)) => e,
            Err(_) => IndexerError::Timeout(policy.timeout),
        };

        warn!(
            "{} failed (attempt {}): {}. Retrying in {:?}...",
            what, attempts, error, policy.delay
        );
        sleep(policy.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy { delay: Duration::from_millis(10), timeout: Duration::from_millis(50) }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_network_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(), "lookup", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(IndexerError::Network("connection reset".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(), "slow", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                sleep(Duration::from_secs(10)).await;
            }
            Ok("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_propagate() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(policy(), "decode", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(IndexerError::Rpc("invalid params".into()))
        })
        .await;

        assert!(matches!(result, Err(IndexerError::Rpc(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
