//! Rate-limit retry loop shared by submission, quoting and polling

use crate::error::{HarvesterError, HarvesterResult};

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// How rate-limited requests are retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Fixed pause before the same request is repeated
    pub cooldown: Duration,
    /// Total attempts allowed; unbounded when `None`
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn new(cooldown: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            cooldown,
            max_attempts: max_attempts.map(|n| n.max(1)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), None)
    }
}

/// Run `op` until it succeeds or fails with something other than rate limiting.
///
/// Each attempt calls `op` afresh, so the closure must rebuild the request from
/// state it already owns (the stamped transaction, the same fee tier).
pub async fn retry_rate_limited<T, F, Fut>(
    policy: &RetryPolicy,
    shutdown: &CancellationToken,
    operation: &str,
    mut op: F,
) -> HarvesterResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarvesterResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if let Some(max) = policy.max_attempts {
                    if attempt >= max {
                        return Err(HarvesterError::RetriesExhausted {
                            operation: operation.to_string(),
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                }

                warn!(
                    "Rate limited during {} (attempt {}), retrying in {:?}",
                    operation, attempt, policy.cooldown
                );
                crate::metrics::record_rate_limit_retry(operation);
                crate::shutdown::sleep(shutdown, policy.cooldown, operation).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited() -> HarvesterError {
        HarvesterError::RateLimited {
            operation: "test".to_string(),
            message: "over rate limit".to_string(),
        }
    }

    fn fast(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1), max_attempts)
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_rate_limited(&fast(None), &CancellationToken::new(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(rate_limited())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: HarvesterResult<()> =
            retry_rate_limited(&fast(None), &CancellationToken::new(), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(HarvesterError::Transaction("insufficient funds".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(HarvesterError::Transaction(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cap_turns_persistent_rate_limit_into_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: HarvesterResult<()> =
            retry_rate_limited(&fast(Some(3)), &CancellationToken::new(), "broadcast", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            })
            .await;

        assert!(matches!(
            result,
            Err(HarvesterError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shutdown_interrupts_cooldown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let policy = RetryPolicy::new(Duration::from_secs(3600), None);
        let result: HarvesterResult<()> =
            retry_rate_limited(&policy, &shutdown, "receipt", || async { Err(rate_limited()) }).await;

        assert!(matches!(result, Err(HarvesterError::Cancelled { .. })));
    }
}
