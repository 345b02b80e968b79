//! Retry policy: attempt budget, backoff schedule and error classes.

use std::fmt;
use std::time::Duration;

use rand::Rng;

/// Default attempt budget for rate-limited API calls.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Upper bound of an exponential delay, in backoff units.
pub const MAX_BACKOFF_UNITS: f64 = 120.0;

/// How a failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Upstream quota exhausted; back off and retry.
    RateLimited,
    /// Network hiccup or server error; back off and retry.
    Transient,
    /// Anything else; give up immediately.
    Permanent,
}

impl fmt::Display for RetryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RateLimited => "rate-limited",
            Self::Transient => "transient",
            Self::Permanent => "permanent",
        };
        f.write_str(name)
    }
}

/// Errors that know whether they are worth retrying.
pub trait Retryable {
    /// Classifies this error.
    fn retry_class(&self) -> RetryClass;
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// `min(2^attempt + jitter, 120)` units, jitter uniform in `[0, 1)`.
    Exponential {
        /// Length of one unit; one second in production.
        unit: Duration,
        /// Whether to add random jitter.
        jitter: bool,
    },
    /// The same delay every time.
    Fixed(Duration),
}

/// Attempt budget plus backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay schedule.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Five attempts with jittered exponential backoff in seconds.
    pub fn exponential() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Exponential {
                unit: Duration::from_secs(1),
                jitter: true,
            },
        }
    }

    /// `max_attempts` attempts separated by a fixed delay.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Returns the policy with a different attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the policy with a different exponential unit. Tests use
    /// milliseconds to keep the schedule's shape without the wait.
    #[must_use]
    pub fn with_unit(mut self, unit: Duration) -> Self {
        if let Backoff::Exponential { unit: u, .. } = &mut self.backoff {
            *u = unit;
        }
        self
    }

    /// Whether another attempt may follow the zero-based `attempt` that
    /// just failed with `class`.
    pub fn allows_retry(&self, class: RetryClass, attempt: u32) -> bool {
        class != RetryClass::Permanent && attempt.saturating_add(1) < self.max_attempts
    }

    /// Delay to wait after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { unit, jitter } => {
                let jitter = if *jitter {
                    rand::thread_rng().gen_range(0.0..1.0)
                } else {
                    0.0
                };
                let exponent = attempt.min(16) as i32;
                let units = (2_f64.powi(exponent) + jitter).min(MAX_BACKOFF_UNITS);
                unit.mul_f64(units)
            }
        }
    }
}

/// Bookkeeping for one task's retries. Lives only as long as the task.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Zero-based index of the current attempt.
    pub attempt: u32,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Delay before the next attempt, once one is scheduled.
    pub next_delay: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delay_bounded_by_schedule() {
        let policy = RetryPolicy::exponential();
        for attempt in 0..12 {
            let bound = (2_f64.powi(attempt as i32) + 1.0).min(120.0);
            for _ in 0..20 {
                let delay = policy.delay_for(attempt).as_secs_f64();
                assert!(delay <= bound, "attempt {attempt}: {delay} > {bound}");
                assert!(delay >= 2_f64.powi(attempt as i32).min(120.0));
            }
        }
    }

    #[test]
    fn exponential_delay_capped() {
        let policy = RetryPolicy::exponential();
        assert!(policy.delay_for(30) <= Duration::from_secs(120));
        assert!(policy.delay_for(u32::MAX) <= Duration::from_secs(120));
    }

    #[test]
    fn without_jitter_delay_is_exact() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Backoff::Exponential {
                unit: Duration::from_millis(10),
                jitter: false,
            },
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(3), Duration::from_millis(80));
    }

    #[test]
    fn with_unit_scales_schedule() {
        let policy = RetryPolicy::exponential().with_unit(Duration::from_millis(1));
        assert!(policy.delay_for(2) < Duration::from_millis(6));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let policy = RetryPolicy::fixed(3, Duration::from_secs(2));
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(7), Duration::from_secs(2));
    }

    #[test]
    fn retry_budget() {
        let policy = RetryPolicy::exponential();
        assert!(policy.allows_retry(RetryClass::RateLimited, 0));
        assert!(policy.allows_retry(RetryClass::Transient, 3));
        assert!(!policy.allows_retry(RetryClass::RateLimited, 4));
        assert!(!policy.allows_retry(RetryClass::Permanent, 0));
    }
}
