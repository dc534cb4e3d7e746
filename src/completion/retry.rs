//! Bounded retry decorator for completion clients.

use super::{CompletionClient, ModelReply, PromptRequest, UpstreamError};
use crate::config::Config;
use async_trait::async_trait;
use std::time::Duration;

/// How many extra attempts to make for transient upstream failures, and how long to wait
/// between them. The default makes no retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first call.
    pub max_retries: u32,
    /// Fixed delay before each retry.
    pub backoff: Duration,
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.completion_max_retries,
            backoff: config.completion_retry_backoff,
        }
    }
}

/// Wraps a [`CompletionClient`] and re-issues calls that fail with a retryable error.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> RetryingClient<C> {
    /// Wrap `inner` with the given policy.
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C> CompletionClient for RetryingClient<C>
where
    C: CompletionClient,
{
    async fn complete(&self, request: &PromptRequest) -> Result<ModelReply, UpstreamError> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.complete(request).await {
                Ok(reply) => return Ok(reply),
                Err(error) if error.retryable && attempt < self.policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        cause = %error.cause,
                        "Transient completion failure; retrying"
                    );
                    if !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}
