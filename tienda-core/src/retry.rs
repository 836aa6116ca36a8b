//! Manual-retry policy.
//!
//! The supervisor never retries on its own; this policy only governs how the
//! UI's "retry" action behaves after consecutive failures: whether another
//! attempt is allowed, and how long to wait before making it.

use std::time::Duration;

/// Delay schedule between consecutive manual retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,
    /// `min(max, base * 2^(failures - 1)) + random(0..=jitter)`.
    Exponential {
        /// Delay after the first failure.
        base: Duration,
        /// Cap on the exponential part.
        max: Duration,
        /// Upper bound of the random jitter added on top.
        jitter: Duration,
    },
}

impl Backoff {
    /// Delay before the attempt following `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Exponential { .. } if failures == 0 => Duration::ZERO,
            Backoff::Exponential { base, max, jitter } => {
                let factor = 2u32.saturating_pow(failures.saturating_sub(1).min(16));
                let exponential = base.saturating_mul(factor).min(max);
                exponential + random_jitter(jitter)
            }
        }
    }
}

/// Policy applied to manual connection retries.
///
/// The default is the reference behavior: unlimited retries, no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Give up after this many consecutive failures (`None` = never).
    pub max_attempts: Option<u32>,
    /// Delay schedule.
    pub backoff: Backoff,
}

/// What to do with a retry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then attempt.
    Proceed {
        /// How long to wait first.
        delay: Duration,
    },
    /// The attempt budget is spent.
    GiveUp {
        /// Consecutive failures so far.
        failures: u32,
    },
}

impl RetryPolicy {
    /// Unlimited immediate retries.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// At most `max_attempts` consecutive failures before giving up.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Backoff::None,
        }
    }

    /// Set the delay schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Decide on a retry after `failures` consecutive failed attempts.
    pub fn decide(&self, failures: u32) -> RetryDecision {
        if let Some(max) = self.max_attempts {
            if failures >= max {
                return RetryDecision::GiveUp { failures };
            }
        }
        RetryDecision::Proceed {
            delay: self.backoff.delay(failures),
        }
    }
}

/// Random jitter in `0..=bound`, at millisecond granularity.
fn random_jitter(bound: Duration) -> Duration {
    let bound_ms = bound.as_millis() as u64;
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    // No entropy means no jitter, not a failed retry.
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (bound_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exponential(jitter_ms: u64) -> Backoff {
        Backoff::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter: Duration::from_millis(jitter_ms),
        }
    }

    #[test]
    fn default_policy_never_gives_up() {
        let policy = RetryPolicy::default();
        for failures in [0, 1, 10, 1_000] {
            assert_eq!(
                policy.decide(failures),
                RetryDecision::Proceed {
                    delay: Duration::ZERO
                }
            );
        }
    }

    #[test]
    fn bounded_policy_gives_up_at_limit() {
        let policy = RetryPolicy::bounded(3);
        assert!(matches!(policy.decide(2), RetryDecision::Proceed { .. }));
        assert_eq!(policy.decide(3), RetryDecision::GiveUp { failures: 3 });
        assert_eq!(policy.decide(7), RetryDecision::GiveUp { failures: 7 });
    }

    #[test]
    fn first_attempt_has_no_delay() {
        assert_eq!(exponential(500).delay(0), Duration::ZERO);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = exponential(0);
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = exponential(0);
        assert_eq!(backoff.delay(10), Duration::from_secs(30));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let backoff = exponential(250);
        for _ in 0..50 {
            let delay = backoff.delay(1);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1_250), "got {:?}", delay);
        }
    }

    #[test]
    fn policy_applies_backoff() {
        let policy = RetryPolicy::bounded(5).with_backoff(exponential(0));
        assert_eq!(
            policy.decide(3),
            RetryDecision::Proceed {
                delay: Duration::from_secs(4)
            }
        );
    }
}
