//! A generic exponential-backoff retry loop, generalized from the
//! geocoding pipeline's per-chunk retry loop to anything that distinguishes
//! transient from permanent failure.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::errors::ExtentError;

/// True if `err` should be retried. Matches spec §4.6's transient/permanent
/// split; every other [`ExtentError`] variant is treated as permanent.
fn is_transient(err: &ExtentError) -> bool {
    matches!(err, ExtentError::ProviderTransient { .. })
}

/// Retry `op` up to `max_retries` additional times (so `max_retries + 1`
/// attempts total) on a transient error, waiting with exponential backoff
/// and up to 20% jitter between attempts. Permanent errors and attempts
/// exhausted both return immediately.
pub async fn with_backoff<T, F, Fut>(
    max_retries: u8,
    initial_wait: Duration,
    mut op: F,
) -> Result<T, ExtentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtentError>>,
{
    let mut wait = initial_wait;
    let mut attempt: u8 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_retries && is_transient(&err) => {
                attempt += 1;
                let jitter = rand::thread_rng().gen_range(0.0..0.2);
                let jittered = wait.mul_f64(1.0 + jitter);
                debug!(
                    attempt,
                    wait_secs = jittered.as_secs_f64(),
                    "retrying after transient error: {err}"
                );
                tokio::time::sleep(jittered).await;
                wait *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ExtentError>(42) }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExtentError::ProviderTransient {
                        provider: "test".to_owned(),
                        message: "flaky".to_owned(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ExtentError> = with_backoff(5, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ExtentError::ProviderPermanent {
                    provider: "test".to_owned(),
                    message: "not found".to_owned(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ExtentError> = with_backoff(2, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ExtentError::ProviderTransient {
                    provider: "test".to_owned(),
                    message: "flaky".to_owned(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
