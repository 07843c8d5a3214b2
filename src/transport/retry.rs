//! Retry transport with bounded exponential backoff
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 2xx with JSON body | Return `Success` |
//! | Any other status | Retry |
//! | Network error / timeout | Retry |
//! | Undecodable body | Retry |
//! | Attempts exhausted | Return `Exhausted` (never an error) |
//!
//! With the default policy the delays between the five attempts are
//! 1s, 2s, 4s and 8s.

use crate::config::RetryConfig;
use crate::transport::RemoteClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Result of a retried remote call
#[derive(Debug)]
pub enum FetchOutcome {
    /// The remote answered with a decodable success body
    Success(Value),

    /// Every attempt failed
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_body(self) -> Option<Value> {
        match self {
            Self::Success(body) => Some(body),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Attempt bound and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exponent)
    }
}

/// Wraps a `RemoteClient` with bounded retries
#[derive(Clone)]
pub struct RetryTransport {
    client: Arc<dyn RemoteClient>,
    policy: RetryPolicy,
}

impl RetryTransport {
    pub fn new(client: Arc<dyn RemoteClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Sends `request` to `url`, retrying every failure until the attempt bound
    ///
    /// Never returns an error: exhaustion is reported as
    /// [`FetchOutcome::Exhausted`] so callers handle success and failure the
    /// same way.
    pub async fn send(&self, url: &str, request: &Value) -> FetchOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.client.post_json(url, request).await {
                Ok(body) => {
                    if attempt > 1 {
                        tracing::info!("Request to {} succeeded after {} attempts", url, attempt);
                    }
                    return FetchOutcome::Success(body);
                }
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    "Request to {} failed after {} attempts: {}",
                    url,
                    attempt,
                    error
                );
                return FetchOutcome::Exhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                };
            }

            let delay = self.policy.backoff_after(attempt);
            tracing::warn!(
                "Request to {} failed (attempt {}/{}): {}. Retrying in {:?}",
                url,
                attempt,
                self.policy.max_attempts,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
