//! Bounded retry policy for transient remote failures.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// How many times, and how long between, a call is retried.
///
/// `max_attempts` counts every request issued, so the default policy sends at
/// most five requests per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,

    /// Delay after a 429 that carries no usable `Retry-After` header.
    pub rate_limit_delay: Duration,

    /// Longest `Retry-After` honoured; longer requests use `rate_limit_delay`.
    pub max_rate_limit_delay: Duration,

    /// Unit of the linear backoff applied after 5xx and transport failures.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_delay: Duration::from_millis(1250),
            max_rate_limit_delay: Duration::from_secs(120),
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps; for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            rate_limit_delay: Duration::ZERO,
            max_rate_limit_delay: Duration::ZERO,
            backoff_step: Duration::ZERO,
        }
    }

    /// Whether another request may follow attempt number `attempt` (1-based).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before retrying a 429.
    pub fn rate_limit_delay(&self, headers: &HeaderMap) -> Duration {
        retry_after(headers)
            .filter(|delay| *delay <= self.max_rate_limit_delay)
            .unwrap_or(self.rate_limit_delay)
    }

    /// Linear backoff after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Seconds from a `Retry-After` header; fractional values are accepted.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds: f64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
        assert_eq!(policy.rate_limit_delay(&HeaderMap::new()), Duration::from_millis(1250));
    }

    #[test]
    fn test_retry_after_header() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(&headers("2")), Duration::from_secs(2));
        assert_eq!(policy.rate_limit_delay(&headers("0.5")), Duration::from_millis(500));
    }

    #[test]
    fn test_unusable_retry_after_falls_back() {
        let policy = RetryPolicy::default();
        for value in ["soon", "-3", "Wed, 21 Oct 2015 07:28:00 GMT", "1e30", "1e400", "NaN", "inf", "121"] {
            assert_eq!(
                policy.rate_limit_delay(&headers(value)),
                Duration::from_millis(1250),
                "value {:?}",
                value
            );
        }
    }

    #[test]
    fn test_retry_after_at_ceiling_is_honoured() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(&headers("120")), Duration::from_secs(120));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(3));
    }
}
