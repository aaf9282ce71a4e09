//! Bounded retry for provider calls.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use super::{LlmError, LlmErrorKind, LlmProvider, LlmRequest};

/// Retry policy with doubling backoff and an overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Budget for all attempts and waits together.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            deadline: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Defaults, overridden by `QUIZ_LLM_MAX_ATTEMPTS` and `QUIZ_LLM_DEADLINE_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Some(attempts) = env::var("QUIZ_LLM_MAX_ATTEMPTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|n| *n > 0)
        {
            policy.max_attempts = attempts;
        }
        if let Some(ms) = env::var("QUIZ_LLM_DEADLINE_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            policy.deadline = Duration::from_millis(ms);
        }
        policy
    }

    /// Wait before the attempt that follows failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1_u32 << shift)
            .min(self.max_backoff)
    }
}

/// Wraps a provider and retries transient failures under a [`RetryPolicy`].
///
/// Permanent failures are returned immediately. Dropping the future cancels
/// the in-flight attempt and any pending wait.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<P: LlmProvider> LlmProvider for RetryingProvider<P> {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let deadline = Instant::now() + self.policy.deadline;
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(deadline_exceeded(attempt - 1));
            }

            let err = match timeout(remaining, self.inner.complete(request)).await {
                Ok(Ok(text)) => {
                    if attempt > 1 {
                        debug!(attempt, "llm call succeeded after retry");
                    }
                    return Ok(text);
                }
                Ok(Err(err)) => err,
                Err(_) => return Err(deadline_exceeded(attempt)),
            };

            if !err.is_transient() || attempt >= self.policy.max_attempts {
                return Err(err);
            }

            let delay = self.policy.backoff_after(attempt);
            if Instant::now() + delay >= deadline {
                return Err(err);
            }

            warn!(
                attempt,
                kind = err.kind.as_str(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "transient llm failure, retrying"
            );
            sleep(delay).await;
        }
    }
}

fn deadline_exceeded(attempts: u32) -> LlmError {
    LlmError::new(
        LlmErrorKind::Timeout,
        format!("retry deadline exceeded after {attempts} attempt(s)"),
    )
}
