//! Timeout configuration for fetch operations.

use std::future::Future;
use std::time::Duration;

use crate::client::FetchError;

/// Timeout configuration for a fetch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Time allowed until response headers arrive.
    pub response: Duration,
    /// Time allowed between two body chunks.
    pub idle: Duration,
}

impl TimeoutConfig {
    /// Create a new timeout configuration.
    pub fn new(response: Duration, idle: Duration) -> Self {
        Self { response, idle }
    }

    /// Use the same limit for headers and body chunks.
    pub fn uniform(limit: Duration) -> Self {
        Self {
            response: limit,
            idle: limit,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::uniform(Duration::from_millis(10_000))
    }
}

/// Run a future under a time limit.
///
/// The future is dropped when the limit passes, which aborts any request
/// it was driving.
pub async fn within<F: Future>(limit: Duration, fut: F) -> Result<F::Output, FetchError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| FetchError::Timeout(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_within_limit() {
        let value = within(Duration::from_millis(100), async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_limit_exceeded() {
        let err = within(
            Duration::from_millis(5),
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
        assert_eq!(err, FetchError::Timeout(Duration::from_millis(5)));
    }
}
