//! Retry/backoff controller for a single adapter call

use tokio::time::{Duration, sleep};

use crate::model::{Item, SourceQuery};
use crate::ports::{SourceAdapter, SourceError};

/// Bounds for retrying one adapter call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Hard cap on the number of attempts, rate-limit waits included
    pub max_retries: u32,
    /// First transient-failure delay, doubled on every further failure
    pub base_delay: Duration,
    /// Longest single rate-limit reset the controller is willing to wait for
    pub max_rate_limit_wait: Duration,
    /// Ceiling on the sum of rate-limit waits within one call
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_rate_limit_wait: Duration::from_secs(60),
            max_total_wait: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// `base_delay * 2^exponent`, saturating
    pub fn backoff_delay(&self, exponent: u32) -> Duration {
        let factor = 2u32.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor)
    }
}

/// What happened to one (adapter, query) call
#[derive(Debug, Clone)]
pub struct AdapterOutcome {
    pub source: String,
    pub query: SourceQuery,
    /// Empty unless the final attempt succeeded
    pub items: Vec<Item>,
    pub attempts: u32,
    /// Outstanding rate-limit reset when the call ended rate limited
    pub retry_after: Option<Duration>,
    /// Last error seen, `None` on success
    pub error: Option<SourceError>,
}

impl AdapterOutcome {
    fn new(source: &str, query: &SourceQuery) -> Self {
        Self {
            source: source.to_string(),
            query: query.clone(),
            items: vec![],
            attempts: 0,
            retry_after: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Call `adapter` until it succeeds, the failure is not worth retrying, or
/// the policy's attempt and wait budgets run out.
///
/// Never fails: exhaustion yields an outcome with no items and the last
/// error recorded.
pub async fn with_retry(
    adapter: &dyn SourceAdapter,
    query: &SourceQuery,
    policy: &RetryPolicy,
) -> AdapterOutcome {
    let mut outcome = AdapterOutcome::new(adapter.name(), query);
    let max_attempts = policy.max_retries.max(1);
    let mut backoff_exponent = 0;
    let mut rate_limit_waited = Duration::ZERO;

    while outcome.attempts < max_attempts {
        outcome.attempts += 1;

        let error = match adapter.fetch(query).await {
            Ok(items) => {
                tracing::debug!(
                    source = %outcome.source,
                    query = %query.text,
                    attempts = outcome.attempts,
                    count = items.len(),
                    "Fetched items"
                );
                outcome.items = items;
                outcome.retry_after = None;
                outcome.error = None;
                return outcome;
            }
            Err(error) => error,
        };

        match error {
            SourceError::RateLimited { retry_after } => {
                let wait = retry_after.unwrap_or_else(|| policy.backoff_delay(backoff_exponent));
                outcome.retry_after = Some(wait);

                if wait > policy.max_rate_limit_wait
                    || rate_limit_waited + wait > policy.max_total_wait
                {
                    tracing::warn!(
                        source = %outcome.source,
                        wait_secs = wait.as_secs(),
                        waited_secs = rate_limit_waited.as_secs(),
                        "Rate limit reset too far away, giving up"
                    );
                    outcome.error = Some(error);
                    return outcome;
                }

                outcome.error = Some(error);
                if outcome.attempts >= max_attempts {
                    break;
                }

                tracing::info!(
                    source = %outcome.source,
                    wait_secs = wait.as_secs(),
                    "Rate limited, waiting for reset"
                );
                sleep(wait).await;
                rate_limit_waited += wait;
            }
            _ if error.is_transient() => {
                tracing::warn!(
                    source = %outcome.source,
                    attempt = outcome.attempts,
                    error = %error,
                    "Transient fetch failure"
                );
                outcome.error = Some(error);
                if outcome.attempts >= max_attempts {
                    break;
                }

                let delay = policy.backoff_delay(backoff_exponent);
                backoff_exponent += 1;
                sleep(delay).await;
            }
            _ => {
                tracing::warn!(
                    source = %outcome.source,
                    query = %query.text,
                    error = %error,
                    "Non-retryable fetch failure"
                );
                outcome.error = Some(error);
                return outcome;
            }
        }
    }

    tracing::warn!(
        source = %outcome.source,
        attempts = outcome.attempts,
        "All retry attempts failed"
    );
    outcome
}
