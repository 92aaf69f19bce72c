use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Exponential backoff with "full jitter": sleep for a random duration in
/// `[0, min(cap, base * 2^attempt)]`. Avoids lockstep retries under
/// contention.
pub fn backoff_full_jitter(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let cap_ms = cap.as_millis() as u64;

    let pow = if attempt >= 63 { u64::MAX } else { 1u64 << attempt };
    let exp_ms = base_ms.saturating_mul(pow);
    let upper = exp_ms.min(cap_ms).max(1);

    let jitter_ms = rand::random_range(0..=upper);
    Duration::from_millis(jitter_ms)
}

/// Retries a fallible async operation with full-jitter backoff, bailing
/// early if `cancel` fires. Used for transient AWS API failures (throttling,
/// connection resets) where a flat retry-without-backoff would pile on.
pub async fn retry_with_backoff<F, Fut, T>(
    cancel: &CancellationToken,
    max_attempts: u32,
    mut op: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let base = Duration::from_millis(200);
    let cap = Duration::from_secs(5);

    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= max_attempts => return Err(err),
            Err(_) => {
                let delay = backoff_full_jitter(base, cap, attempt);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

/// Polls `check` on a fixed interval until it reports convergence, the
/// overall `timeout` elapses, or `cancel` fires — the shape every
/// convergence-wait driver (database capacity, instance-group capacity,
/// container-service stability) builds on.
pub async fn poll_until_converged<F, Fut>(
    cancel: &CancellationToken,
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if check().await? {
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(Error::State(format!(
                "timed out after {:?} waiting for convergence",
                timeout
            )));
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn poll_until_converged_stops_once_predicate_is_true() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result = poll_until_converged(&cancel, Duration::from_millis(1), Duration::from_secs(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 2) }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_until_converged_times_out() {
        let cancel = CancellationToken::new();
        let result = poll_until_converged(&cancel, Duration::from_millis(1), Duration::from_millis(5), || async {
            Ok(false)
        })
        .await;
        assert!(matches!(result, Err(Error::State(_))));
    }

    #[tokio::test]
    async fn poll_until_converged_honors_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = poll_until_converged(&cancel, Duration::from_secs(30), Duration::from_secs(60), || async {
            Ok(false)
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn retry_with_backoff_returns_first_success() {
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(&cancel, 5, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::State("transient".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
