//! Retry with exponential backoff for transient failures
//!
//! Used for provider HTTP calls and datastore writes alike. The caller decides
//! which errors are worth retrying.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_backoff.saturating_mul(2_u32.pow(exp));
        backoff.min(self.max_backoff)
    }
}

/// Execute an operation, retrying while `is_retriable` says so.
///
/// # Example
/// ```ignore
/// let body = execute_with_retry(
///     &policy,
///     "espn_site GET /teams",
///     || client.get_once(&url),
///     FetchError::is_transient,
/// ).await?;
/// ```
pub async fn execute_with_retry<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    label: &str,
    mut f: F,
    is_retriable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_attempts && is_retriable(&e) => {
                let backoff = policy.backoff_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
