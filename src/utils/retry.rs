//! Retry wrapper for provider lookups
//!
//! Linear backoff: after failed attempt `n` the wrapper sleeps `base_delay * n`.
//! Each attempt is bounded by its own timeout. The wrapper never swallows the
//! final error; callers decide how to degrade.

use eyre::{eyre, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::utils::constants::{
    DEFAULT_PROVIDER_TIMEOUT_MS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total attempts, at least 1
    pub attempts: u32,
    pub base_delay: Duration,
    /// Bound on a single attempt
    pub timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
        }
    }
}

/// Result of a retried operation plus the number of attempts it consumed
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Run `op` up to `options.attempts` times, reporting how many attempts ran
pub async fn run_with_retry<T, F, Fut>(
    label: &str,
    options: &RetryOptions,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = options.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        let outcome = match tokio::time::timeout(options.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(eyre!(
                "{} timed out after {}ms",
                label,
                options.timeout.as_millis()
            )),
        };

        match outcome {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) => {
                warn!(
                    target_name = label,
                    attempt,
                    max_attempts,
                    error = %e,
                    "⚠️ Provider attempt failed"
                );
                last_error = Some(e);
            }
        }

        if attempt < max_attempts {
            let delay = options.base_delay * attempt;
            debug!(
                "⏳ Retry {}/{} for {} after {}ms",
                attempt + 1,
                max_attempts,
                label,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    RetryOutcome {
        result: Err(last_error
            .unwrap_or_else(|| eyre!("{} failed after {} attempts", label, max_attempts))),
        attempts: max_attempts,
    }
}

/// Same as [`run_with_retry`] when the attempt count does not matter
pub async fn with_retry<T, F, Fut>(label: &str, options: &RetryOptions, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run_with_retry(label, options, op).await.result
}
