//! Caller-side retry of whole lookups.
//!
//! Adapters and the orchestrator never retry; the CLI wraps each primary
//! call in [`retry_with_policy`], which picks a backoff from the failure.

use crate::client::providers::FetchError;
use crate::error::ErrorCategory;
use crate::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff for one class of failure
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Upper bound of the random extra delay, as a fraction of the delay
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (0-based), jittered and capped
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = (self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        let backoff = Duration::from_secs_f64(secs);

        if self.jitter <= 0.0 {
            return backoff;
        }
        let spread = backoff.mul_f64(self.jitter);
        backoff + spread.mul_f64(rand::thread_rng().gen_range(0.0..=1.0))
    }
}

/// Chooses a [`RetryConfig`] from the error a lookup failed with
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Connection resets and timeouts
    pub transient: RetryConfig,
    /// 503s and other 5xx answers from a source
    pub unavailable: RetryConfig,
    pub rate_limited: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient: RetryConfig::default(),
            unavailable: RetryConfig {
                max_attempts: 4,
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
                jitter: 0.2,
            },
            rate_limited: RetryConfig {
                max_attempts: 5,
                initial_delay: Duration::from_secs(3),
                max_delay: Duration::from_secs(60),
                multiplier: 1.5,
                jitter: 0.3,
            },
        }
    }
}

impl RetryPolicy {
    /// `None` for failures that another attempt cannot fix
    #[must_use]
    pub fn config_for_error(&self, error: &Error) -> Option<&RetryConfig> {
        match error.category() {
            ErrorCategory::Permanent => None,
            ErrorCategory::RateLimited => Some(&self.rate_limited),
            ErrorCategory::Transient => match error {
                Error::Fetch(FetchError::ServiceUnavailable(_)) => Some(&self.unavailable),
                Error::Fetch(FetchError::Http { status, .. }) if *status >= 500 => {
                    Some(&self.unavailable)
                }
                _ => Some(&self.transient),
            },
        }
    }

    /// Delay before the next attempt, honouring a source's requested wait
    fn delay_for(config: &RetryConfig, retry: u32, error: &Error) -> Duration {
        error
            .retry_after()
            .map_or_else(|| config.delay_for(retry), |wait| wait.min(config.max_delay))
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of
/// attempts for its failure class.
pub async fn retry_with_policy<T, F, Fut>(
    operation: F,
    policy: &RetryPolicy,
    operation_name: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;

    loop {
        debug!("Executing '{}' (attempt {})", operation_name, attempt);

        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("'{}' succeeded after {} attempts", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let Some(config) = policy.config_for_error(&error) else {
            debug!("'{}' failed permanently: {}", operation_name, error);
            return Err(error);
        };

        if attempt >= config.max_attempts {
            warn!("'{}' failed after {} attempts: {}", operation_name, attempt, error);
            return Err(error);
        }

        let delay = RetryPolicy::delay_for(config, attempt - 1, &error);
        debug!(
            "'{}' failed (attempt {}), retrying after {:?}: {}",
            operation_name, attempt, delay, error
        );

        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn network_error() -> Error {
        Error::Fetch(FetchError::Network("connection reset".to_string()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_with_policy(
            move || {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(network_error())
                    } else {
                        Ok(42u32)
                    }
                }
            },
            &RetryPolicy::default(),
            "fetch_by_id",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_with_policy(
            move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<u32, Error>(Error::Fetch(FetchError::NotFound {
                        identifier: "2101.99999".to_string(),
                    }))
                }
            },
            &RetryPolicy::default(),
            "fetch_by_id",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_source_stops_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let policy = RetryPolicy {
            unavailable: RetryConfig {
                max_attempts: 2,
                ..RetryConfig::default()
            },
            ..RetryPolicy::default()
        };

        let result = retry_with_policy(
            move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<u32, Error>(Error::Fetch(FetchError::ServiceUnavailable(
                        "503 Service Unavailable".to_string(),
                    )))
                }
            },
            &policy,
            "fetch_by_query",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let config = RetryConfig {
            jitter: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for(0), Duration::from_millis(250));
        assert_eq!(config.delay_for(2), Duration::from_secs(1));
        assert_eq!(config.delay_for(10), Duration::from_secs(10));

        let jittered = RetryConfig::default().delay_for(0);
        assert!(jittered >= Duration::from_millis(250));
        assert!(jittered <= Duration::from_millis(280));
    }

    #[test]
    fn test_policy_by_failure() {
        let policy = RetryPolicy::default();

        let invalid = Error::Fetch(FetchError::invalid_identifier("x", "bad"));
        assert!(policy.config_for_error(&invalid).is_none());

        assert_eq!(policy.config_for_error(&network_error()), Some(&policy.transient));

        let server_error = Error::Fetch(FetchError::Http {
            status: 502,
            message: String::new(),
        });
        assert_eq!(policy.config_for_error(&server_error), Some(&policy.unavailable));

        let rate_limited = Error::Fetch(FetchError::RateLimit);
        assert_eq!(policy.config_for_error(&rate_limited), Some(&policy.rate_limited));
        assert_eq!(
            RetryPolicy::delay_for(&policy.rate_limited, 0, &rate_limited),
            Duration::from_secs(60)
        );
    }
}
