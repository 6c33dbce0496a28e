//! Retry policy: backoff delays and the retry/give-up decision.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ErrorKind;

/// What the worker should do after a failed execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Schedule the next attempt no earlier than `delay` from now.
    Retry { delay: Duration, reason: String },

    /// Mark the task failed.
    GiveUp { reason: String },
}

/// Exponential backoff: `delay(attempt) = base_delay * 2^attempt`.
///
/// `attempt` is 0 for the first retry after the initial failed execution.
///
/// When `max_jitter` is non-zero a uniformly random extra delay in
/// `[0, max_jitter]` is added, so `backoff(n) <= delay(n) <= backoff(n) + max_jitter`.
/// With the default zero jitter `delay(n + 1) == 2 * delay(n)` exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Deterministic part of the delay. Saturates instead of overflowing.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Delay before the retry numbered `attempt`, jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if self.max_jitter.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(Duration::ZERO..=self.max_jitter);
        base.saturating_add(extra)
    }

    /// Pure decision after a failure.
    ///
    /// `attempt` is the retry counter of the execution that just failed, so
    /// `attempt + 1` executions have happened. Retries stop once that count
    /// reaches `max_attempts`; terminal failures never retry.
    pub fn decide(&self, attempt: u32, max_attempts: u32, kind: ErrorKind) -> Decision {
        if !kind.is_retryable() {
            return Decision::GiveUp {
                reason: "terminal failure".to_string(),
            };
        }

        let executed = attempt.saturating_add(1);
        if executed >= max_attempts {
            Decision::GiveUp {
                reason: format!("max attempts reached: {executed}/{max_attempts}"),
            }
        } else {
            let delay = self.delay(attempt);
            Decision::Retry {
                delay,
                reason: format!(
                    "retry {}/{} after {:?}",
                    executed + 1,
                    max_attempts,
                    delay
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_policy_matches_observed_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(60));
        assert_eq!(policy.max_jitter, Duration::ZERO);
    }

    #[rstest]
    #[case(0, 60)]
    #[case(1, 120)]
    #[case(2, 240)]
    #[case(3, 480)]
    fn backoff_doubles_from_base(#[case] attempt: u32, #[case] secs: u64) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(attempt), Duration::from_secs(secs));
    }

    #[test]
    fn each_delay_is_exactly_twice_the_previous() {
        let policy = RetryPolicy::new(Duration::from_millis(250));
        for attempt in 0..10 {
            assert_eq!(policy.delay(attempt + 1), policy.delay(attempt) * 2);
        }
    }

    #[test]
    fn huge_attempt_saturates() {
        let policy = RetryPolicy::default();
        assert!(policy.delay(200) >= policy.delay(31));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let jitter = Duration::from_millis(500);
        let policy = RetryPolicy::new(Duration::from_secs(1)).with_jitter(jitter);
        for attempt in 0..5 {
            for _ in 0..50 {
                let d = policy.delay(attempt);
                assert!(d >= policy.backoff(attempt));
                assert!(d <= policy.backoff(attempt) + jitter);
            }
        }
    }

    #[rstest]
    #[case::first_failure(0, true)]
    #[case::second_failure(1, true)]
    #[case::third_failure(2, false)]
    fn transient_failures_retry_until_cap(#[case] attempt: u32, #[case] retries: bool) {
        let policy = RetryPolicy::new(Duration::from_secs(1));
        let decision = policy.decide(attempt, 3, ErrorKind::Transient);
        assert_eq!(matches!(decision, Decision::Retry { .. }), retries);
    }

    #[test]
    fn retry_carries_backoff_for_the_attempt() {
        let policy = RetryPolicy::new(Duration::from_secs(1));
        match policy.decide(1, 3, ErrorKind::Infrastructure) {
            Decision::Retry { delay, .. } => assert_eq!(delay, Duration::from_secs(2)),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn terminal_failure_gives_up_immediately() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.decide(0, 3, ErrorKind::Terminal),
            Decision::GiveUp { .. }
        ));
    }

    #[test]
    fn single_attempt_budget_never_retries() {
        let policy = RetryPolicy::default();
        assert!(matches!(
            policy.decide(0, 1, ErrorKind::Transient),
            Decision::GiveUp { .. }
        ));
    }

    #[test]
    fn policy_deserializes_humantime() {
        let policy: RetryPolicy = serde_yaml::from_str("base_delay: 1s\nmax_jitter: 250ms\n").unwrap();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_jitter, Duration::from_millis(250));
    }
}
