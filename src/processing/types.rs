//! Core data types and error definitions for the document pipeline.

use crate::completion::UpstreamError;
use thiserror::Error;

/// The only media type accepted by this API version.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Directive sent with every summary request.
pub const SUMMARY_DIRECTIVE: &str = "Please provide a comprehensive summary of this document, \
including the main topics, key points, and any important information.";

/// Document received at request ingress. Lives only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    /// Document bytes. May be cut short when the upload exceeded the ceiling while streaming in.
    pub bytes: Vec<u8>,
    /// Media type declared by the client (empty when none was sent).
    pub media_type: String,
    /// Total number of bytes the client sent.
    pub declared_size: usize,
}

impl UploadedDocument {
    /// Wrap a fully read payload.
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        let declared_size = bytes.len();
        Self {
            bytes,
            media_type: media_type.into(),
            declared_size,
        }
    }
}

/// Trimmed, non-empty instruction text. Only obtainable through validation or the fixed summary
/// directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction(String);

impl Instruction {
    /// Trim `raw` and reject it when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// The fixed summarization directive.
    pub fn summary_directive() -> Self {
        Self(SUMMARY_DIRECTIVE.to_string())
    }

    /// Borrow the instruction text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the instruction text.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Which pipeline a request runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Free-form question about the document.
    Question,
    /// Fixed summarization directive.
    Summary,
}

/// Reasons an upload is rejected before the model is contacted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Media type was not `application/pdf`.
    #[error("Only PDF files are allowed")]
    UnsupportedMediaType {
        /// Media type the client declared.
        found: String,
    },
    /// Payload exceeded the configured ceiling.
    #[error("File size exceeds maximum allowed size of {} MB", mib_label(.limit_bytes))]
    PayloadTooLarge {
        /// Bytes received.
        size: usize,
        /// Configured ceiling in bytes.
        limit_bytes: usize,
    },
    /// Question was missing or blank after trimming.
    #[error("Question is required")]
    MissingInstruction,
    /// Form data could not be read or a required field was absent.
    #[error("{0}")]
    MalformedRequest(String),
}

/// Render a byte count in MiB, dropping the fraction when it is zero.
pub fn mib_label(bytes: &usize) -> String {
    let mib = *bytes as f64 / 1024.0 / 1024.0;
    if mib.fract() == 0.0 {
        format!("{mib:.0}")
    } else {
        let rendered = format!("{mib:.2}");
        rendered.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Coarse classification used by the HTTP boundary to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller can fix the request.
    ClientInput,
    /// The completion service failed.
    Upstream,
    /// Unexpected failure inside the service.
    Internal,
}

/// Errors emitted by the document pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Upload failed validation.
    #[error(transparent)]
    Rejected(#[from] ValidationError),
    /// Completion service failed.
    #[error("{0}")]
    Upstream(#[from] UpstreamError),
    /// Unexpected failure in composition logic.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProcessingError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(_) => ErrorKind::ClientInput,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}
