//! Completion client abstraction and the Gemini adapter.
//!
//! A [`CompletionClient`] turns one [`PromptRequest`] (document bytes followed by an instruction)
//! into one [`ModelReply`]. Every provider failure crosses this boundary as an
//! [`UpstreamError`]; nothing provider-specific leaks to callers.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod gemini;
pub mod retry;

pub use gemini::{GeminiClient, GeminiSettings};
pub use retry::{RetryPolicy, RetryingClient};

/// Failure reported by the upstream completion service.
///
/// `cause` is a human-readable message that never contains credentials. `retryable` marks
/// transient conditions (transport errors, timeouts, throttling, 5xx) that a retry policy may act
/// on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{cause}")]
pub struct UpstreamError {
    /// Message describing what went wrong upstream.
    pub cause: String,
    /// Whether another attempt could reasonably succeed.
    pub retryable: bool,
}

impl UpstreamError {
    /// Failure that may clear up on its own.
    pub fn transient(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            retryable: true,
        }
    }

    /// Failure that will repeat for the same request.
    pub fn permanent(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            retryable: false,
        }
    }
}

/// Two-part prompt handed to the completion model: grounding document first, directive second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// Raw document bytes.
    pub document: Vec<u8>,
    /// Media type tagged onto the document part.
    pub media_type: String,
    /// Instruction text, already trimmed.
    pub instruction: String,
}

/// Text generated by the model together with the identifier of the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    /// Generated text.
    pub text: String,
    /// Model identifier reported for the completion.
    pub model: String,
}

/// Interface implemented by completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Issue one completion for the supplied prompt.
    async fn complete(&self, request: &PromptRequest) -> Result<ModelReply, UpstreamError>;
}

#[async_trait]
impl<T> CompletionClient for Arc<T>
where
    T: CompletionClient + ?Sized,
{
    async fn complete(&self, request: &PromptRequest) -> Result<ModelReply, UpstreamError> {
        (**self).complete(request).await
    }
}
