//! Bounded retry with exponential backoff for transient artifact-download
//! failures.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, warn};

/// Retry policy. The defaults bound total wall-clock to a few seconds so a
/// single flaky fetch cannot eat a deployment's overall deadline — every
/// suspension point is bounded by it.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Run `operation` under `config`'s backoff, retrying on every error (the
/// caller is expected to only hand this transient I/O errors; digest
/// mismatches and `RecipeNotFound` are not retried by the store, which
/// calls the transport directly for those).
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    operation
        .retry(config.backoff())
        .notify(|err: &E, dur: Duration| {
            warn!(error = %err, delay = ?dur, "fetch failed, retrying");
        })
        .await
        .inspect(|_| debug!("fetch succeeded"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&config, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("transient".to_string())
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let attempts = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry(&config, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>("always fails".to_string())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
