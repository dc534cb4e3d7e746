//! Wire shapes for pipeline results.
//!
//! Success envelopes carry the generated text, the model identifier, and a timestamp taken when
//! the envelope is built, i.e. when the answer was finalized rather than when the request
//! arrived. Failure envelopes always carry `success: false`, a short `error`, an optional
//! `detail`, and a machine-readable `error_type`.

use crate::completion::ModelReply;
use crate::processing::{PipelineMode, ProcessingError, ValidationError};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Successful `/pdf/ask` response.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerEnvelope {
    /// Always `true`.
    pub success: bool,
    /// Generated answer.
    pub answer: String,
    /// Model that produced the answer.
    pub model_used: String,
    /// RFC 3339 time the answer was finalized.
    pub timestamp: String,
}

impl AnswerEnvelope {
    /// Wrap a model reply, stamping the current time.
    pub fn from_reply(reply: ModelReply) -> Self {
        Self {
            success: true,
            answer: reply.text,
            model_used: reply.model,
            timestamp: current_timestamp_rfc3339(),
        }
    }
}

/// Successful `/pdf/analyze` response.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEnvelope {
    /// Always `true`.
    pub success: bool,
    /// Generated summary.
    pub summary: String,
    /// Model that produced the summary.
    pub model_used: String,
    /// RFC 3339 time the summary was finalized.
    pub timestamp: String,
}

impl SummaryEnvelope {
    /// Wrap a model reply, stamping the current time.
    pub fn from_reply(reply: ModelReply) -> Self {
        Self {
            success: true,
            summary: reply.text,
            model_used: reply.model,
            timestamp: current_timestamp_rfc3339(),
        }
    }
}

/// Failure response shared by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    /// Always `false`.
    pub success: bool,
    /// Short description of the failure.
    pub error: String,
    /// Longer description, omitted for internal errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Machine-readable failure category.
    pub error_type: &'static str,
}

impl ErrorEnvelope {
    /// Map a pipeline error to its wire form.
    ///
    /// Upstream causes are prefixed with a fixed, mode-specific message; internal errors are
    /// reported generically.
    pub fn from_error(error: &ProcessingError, mode: PipelineMode) -> Self {
        match error {
            ProcessingError::Rejected(rejection) => {
                let message = rejection.to_string();
                Self {
                    success: false,
                    error: message.clone(),
                    detail: Some(message),
                    error_type: rejection_type(rejection),
                }
            }
            ProcessingError::Upstream(upstream) => {
                let prefix = match mode {
                    PipelineMode::Question => "Failed to process PDF",
                    PipelineMode::Summary => "Failed to analyze PDF",
                };
                Self {
                    success: false,
                    error: prefix.to_string(),
                    detail: Some(format!("{prefix}: {}", upstream.cause)),
                    error_type: "upstream_error",
                }
            }
            ProcessingError::Internal(_) => Self {
                success: false,
                error: "Internal server error".to_string(),
                detail: None,
                error_type: "internal_error",
            },
        }
    }
}

fn rejection_type(error: &ValidationError) -> &'static str {
    match error {
        ValidationError::UnsupportedMediaType { .. } => "unsupported_media_type",
        ValidationError::PayloadTooLarge { .. } => "payload_too_large",
        ValidationError::MissingInstruction => "missing_instruction",
        ValidationError::MalformedRequest(_) => "invalid_request",
    }
}

pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
