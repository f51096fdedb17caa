use crate::client::providers::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// Extension trait to bound adapter futures in time
#[allow(async_fn_in_trait)]
pub trait TimeoutExt<T> {
    /// Resolve to `FetchError::Timeout` when `duration` elapses first
    async fn with_deadline(self, duration: Duration) -> Result<T, FetchError>;
}

impl<F, T> TimeoutExt<T> for F
where
    F: Future<Output = T>,
{
    async fn with_deadline(self, duration: Duration) -> Result<T, FetchError> {
        match timeout(duration, self).await {
            Ok(result) => Ok(result),
            Err(_) => {
                debug!("Operation timed out after {:?}", duration);
                Err(FetchError::Timeout(duration))
            }
        }
    }
}

/// Overall time budget of one orchestrated call
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Duration,
    expires_at: Instant,
}

impl Deadline {
    /// Start a budget of `budget` from now
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            budget,
            expires_at: Instant::now() + budget,
        }
    }

    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    #[must_use]
    pub const fn instant(&self) -> Instant {
        self.expires_at
    }

    /// Time left, zero once expired
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// `limit` capped by the remaining budget
    #[must_use]
    pub fn cap(&self, limit: Duration) -> Duration {
        limit.min(self.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_with_deadline_success() {
        let result = async { 42 }.with_deadline(Duration::from_millis(100)).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_deadline_timeout() {
        let result = async {
            sleep(Duration::from_millis(200)).await;
            42
        }
        .with_deadline(Duration::from_millis(50))
        .await;

        assert_eq!(result, Err(FetchError::Timeout(Duration::from_millis(50))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_caps_and_expires() {
        let deadline = Deadline::after(Duration::from_secs(10));
        assert_eq!(deadline.cap(Duration::from_secs(3)), Duration::from_secs(3));

        sleep(Duration::from_secs(8)).await;
        assert_eq!(deadline.cap(Duration::from_secs(3)), Duration::from_secs(2));
        assert!(!deadline.is_expired());

        sleep(Duration::from_secs(5)).await;
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }
}
