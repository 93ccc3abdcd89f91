//! Bounded retry/poll primitives.
//!
//! Every blocking loop in the harness is governed by a [`RetryPolicy`]: a
//! total budget and a poll interval. The loop stops at the first success, or
//! with [`Error::Timeout`] once the budget has elapsed since the first
//! attempt. All intermediate failures are recorded so the final error can
//! surface the full history, not just the last line.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// Budget for a bounded retry loop.
///
/// Invariant: `poll_interval < total_timeout`, enforced by [`RetryPolicy::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total time allowed since the first attempt.
    pub total_timeout: Duration,
    /// Sleep between attempts.
    pub poll_interval: Duration,
}

impl RetryPolicy {
    /// Create a policy, rejecting intervals that do not fit the budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPolicy`] if `poll_interval >= total_timeout`.
    pub fn new(total_timeout: Duration, poll_interval: Duration) -> Result<Self> {
        if poll_interval >= total_timeout {
            return Err(Error::InvalidPolicy {
                total_timeout,
                poll_interval,
            });
        }
        Ok(Self {
            total_timeout,
            poll_interval,
        })
    }

    /// Scale the total budget (slow architectures, loaded CI runners).
    /// The poll interval is left alone so progress is still observed at the
    /// same cadence.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            total_timeout: Duration::from_secs_f64(self.total_timeout.as_secs_f64() * factor),
            poll_interval: self.poll_interval,
        }
    }
}

/// Run `op` until it succeeds or the policy budget is exhausted.
///
/// `what` names the operation for logs and the final error. Each failed
/// attempt's description is kept; the returned [`Error::Timeout`] carries the
/// whole log.
///
/// # Errors
///
/// Returns [`Error::Timeout`] once `total_timeout` has elapsed since the
/// first attempt without a success.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    let start = Instant::now();
    let mut log: Vec<String> = Vec::new();

    loop {
        match op().await {
            Ok(value) => {
                if !log.is_empty() {
                    debug!(
                        what,
                        failed_attempts = log.len(),
                        "succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(failure) => {
                debug!(what, attempt = log.len() + 1, %failure, "attempt failed");
                log.push(failure);
            }
        }

        if start.elapsed() >= policy.total_timeout {
            let last_failure = log.last().cloned().unwrap_or_default();
            return Err(Error::Timeout {
                what: what.to_string(),
                budget: policy.total_timeout,
                attempts: u32::try_from(log.len()).unwrap_or(u32::MAX),
                last_failure,
                log,
            });
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(200), Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn policy_rejects_interval_exceeding_budget() {
        let err = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { .. }));

        let err = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { .. }));
    }

    #[test]
    fn policy_scaling_stretches_budget_only() {
        let policy = RetryPolicy::new(Duration::from_secs(120), Duration::from_secs(20))
            .unwrap()
            .scaled(2.0);
        assert_eq!(policy.total_timeout, Duration::from_secs(240));
        assert_eq!(policy.poll_interval, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn returns_first_success_output_only() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let out = retry(&quick_policy(), "flaky op", move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("attempt {n} failed"))
                } else {
                    Ok(format!("attempt {n} output"))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(out, "attempt 3 output");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_with_full_attempt_log() {
        let start = Instant::now();
        let policy = quick_policy();
        let err = retry(&policy, "hopeless op", || async { Err::<(), _>("nope".to_string()) })
            .await
            .unwrap_err();

        // Budget plus one poll interval is the latest acceptable signal time.
        assert!(start.elapsed() < policy.total_timeout + policy.poll_interval * 4);

        match err {
            Error::Timeout {
                attempts,
                last_failure,
                log,
                ..
            } => {
                assert!(attempts >= 2);
                assert_eq!(last_failure, "nope");
                assert_eq!(log.len() as u32, attempts);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
