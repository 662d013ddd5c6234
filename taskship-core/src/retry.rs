//! Bounded retry with capped exponential backoff.
//!
//! Shared by the availability poller and the notifier. An attempt reports
//! success or "not yet"; there is no error channel because both call sites
//! fold failures into a status flag instead of aborting the task.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on calls made, including the first.
    pub max_attempts: u32,
    /// Unit multiplied by the power of two.
    pub base_delay: Duration,
    /// Exponent at which the delay stops growing.
    pub cap_exponent: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, cap_exponent: u32) -> Self {
        Self {
            max_attempts,
            base_delay,
            cap_exponent,
        }
    }

    /// Wait after the failed attempt `attempt` (0-based): `base * 2^min(attempt, cap)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.cap_exponent).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Largest wait this policy can produce.
    pub fn max_delay(&self) -> Duration {
        self.delay_after(self.cap_exponent)
    }
}

/// Run `attempt` until it yields `true` or the budget is spent.
///
/// Sleeps only between attempts, never after the last one. The closure gets
/// the 0-based attempt index.
pub async fn retry_until<F, Fut>(policy: &RetryPolicy, label: &str, mut attempt: F) -> bool
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    for index in 0..policy.max_attempts {
        if attempt(index).await {
            debug!(label, attempt = index, "[RETRY] attempt succeeded");
            return true;
        }
        if index + 1 < policy.max_attempts {
            let delay = policy.delay_after(index);
            debug!(label, attempt = index, delay_ms = delay.as_millis() as u64, "[RETRY] backing off");
            tokio::time::sleep(delay).await;
        }
    }
    warn!(label, attempts = policy.max_attempts, "[RETRY] attempt budget exhausted");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delays_double_until_the_cap() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), 4);
        let delays: Vec<u64> = (0..8).map(|i| policy.delay_after(i).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 16, 16, 16]);
        assert_eq!(policy.max_delay(), Duration::from_secs(16));
    }

    #[test]
    fn delays_are_non_decreasing_and_bounded() {
        for cap in 0..6 {
            let policy = RetryPolicy::new(20, Duration::from_millis(250), cap);
            let mut previous = Duration::ZERO;
            for i in 0..20 {
                let d = policy.delay_after(i);
                assert!(d >= previous, "delay shrank at attempt {i} with cap {cap}");
                assert!(d <= policy.max_delay());
                previous = d;
            }
        }
    }

    #[test]
    fn huge_attempt_index_does_not_overflow() {
        let policy = RetryPolicy::new(1, Duration::from_secs(1), u32::MAX);
        assert_eq!(policy.delay_after(u32::MAX), Duration::from_secs(1u64 << 31));
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO, 4);
        let ok = retry_until(&policy, "test", |i| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { i == 2 }
        })
        .await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_exceeds_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, Duration::ZERO, 4);
        let ok = retry_until(&policy, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_budget_makes_no_calls() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::ZERO, 4);
        let ok = retry_until(&policy, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { true }
        })
        .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
