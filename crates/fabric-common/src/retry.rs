//! Interval/timeout polling.
//!
//! Used to wait for a device to converge (for example a management cluster
//! forming) without blocking the caller past a deadline. The check runs once
//! per interval tick; the first check happens after one interval, matching
//! how a freshly configured device needs time before it reports anything.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default poll timeout.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(90);

/// Default interval between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// How often and for how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Upper bound on the number of checks this policy can issue.
    pub fn max_attempts(&self) -> u64 {
        if self.interval.is_zero() {
            return 0;
        }
        (self.timeout.as_millis() / self.interval.as_millis()) as u64
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT)
    }
}

/// Why [`poll_until`] stopped without a value.
#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error("polling timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("polling cancelled")]
    Cancelled,

    #[error(transparent)]
    Check(E),
}

/// Runs `check` every `policy.interval` until it yields a value.
///
/// `check` receives the 1-based attempt number. `Ok(None)` means "not yet",
/// `Err` aborts polling immediately. The deadline wins over a tick that
/// lands on the same instant.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempt = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                return Err(PollError::TimedOut { elapsed: started.elapsed() });
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }

        attempt += 1;
        match check(attempt).await {
            Ok(Some(value)) => {
                tracing::debug!(attempt, "Poll converged");
                return Ok(value);
            }
            Ok(None) => tracing::trace!(attempt, "Poll not converged yet"),
            Err(e) => return Err(PollError::Check(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(15));
        assert_eq!(policy.timeout, Duration::from_secs(90));
        assert_eq!(policy.max_attempts(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_converges_on_third_attempt() {
        let policy = PollPolicy::default();
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let result: Result<u64, PollError<String>> = poll_until(&policy, &cancel, |attempt| async move {
            Ok((attempt == 3).then_some(attempt))
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out() {
        let policy = PollPolicy::default();
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();

        let result: Result<(), PollError<String>> = poll_until(&policy, &cancel, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        })
        .await;

        match result {
            Err(PollError::TimedOut { elapsed }) => assert_eq!(elapsed, Duration::from_secs(90)),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_aborts() {
        let policy = PollPolicy::default();
        let cancel = CancellationToken::new();

        let result: Result<(), PollError<String>> =
            poll_until(&policy, &cancel, |_| async { Err("boom".to_string()) }).await;

        assert!(matches!(result, Err(PollError::Check(ref e)) if e == "boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_tick() {
        let policy = PollPolicy::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), PollError<String>> =
            poll_until(&policy, &cancel, |_| async { Ok(None) }).await;

        assert!(matches!(result, Err(PollError::Cancelled)));
    }
}
