//! Document service coordinating validation and completion.

use crate::{
    completion::{CompletionClient, ModelReply, PromptRequest},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        types::{Instruction, PipelineMode, ProcessingError, UploadedDocument},
        validation::DocumentValidator,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the question-answering and summary pipelines.
///
/// The completion client is injected at construction and shared across requests; the service
/// keeps no per-request state, so one instance behind an `Arc` serves every handler.
pub struct DocumentService {
    client: Arc<dyn CompletionClient>,
    validator: DocumentValidator,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Answer a free-form question about the document.
    async fn answer(
        &self,
        document: UploadedDocument,
        question: String,
    ) -> Result<ModelReply, ProcessingError>;

    /// Summarize the document with the fixed directive.
    async fn summarize(&self, document: UploadedDocument) -> Result<ModelReply, ProcessingError>;

    /// Ceiling enforced on uploads, in bytes.
    fn max_upload_bytes(&self) -> usize;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Build a service around an already constructed completion client.
    pub fn new(client: Arc<dyn CompletionClient>, validator: DocumentValidator) -> Self {
        Self {
            client,
            validator,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    async fn run(
        &self,
        mode: PipelineMode,
        document: UploadedDocument,
        instruction: Instruction,
    ) -> Result<ModelReply, ProcessingError> {
        let request = PromptRequest {
            document: document.bytes,
            media_type: document.media_type,
            instruction: instruction.into_inner(),
        };

        match self.client.complete(&request).await {
            Ok(reply) => {
                match mode {
                    PipelineMode::Question => self.metrics.record_answer(),
                    PipelineMode::Summary => self.metrics.record_summary(),
                }
                Ok(reply)
            }
            Err(error) => {
                self.metrics.record_upstream_failure();
                tracing::error!(mode = ?mode, cause = %error.cause, "Completion failed");
                Err(error.into())
            }
        }
    }

    fn reject(&self, error: impl Into<ProcessingError>) -> ProcessingError {
        let error = error.into();
        self.metrics.record_rejection();
        tracing::info!(reason = %error, "Upload rejected");
        error
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn answer(
        &self,
        document: UploadedDocument,
        question: String,
    ) -> Result<ModelReply, ProcessingError> {
        let instruction = self
            .validator
            .validate_question(&document, &question)
            .map_err(|error| self.reject(error))?;

        let preview: String = instruction.as_str().chars().take(50).collect();
        tracing::info!(
            document_bytes = document.declared_size,
            question = %preview,
            "Processing PDF question"
        );
        self.run(PipelineMode::Question, document, instruction).await
    }

    async fn summarize(&self, document: UploadedDocument) -> Result<ModelReply, ProcessingError> {
        self.validator
            .validate_document(&document)
            .map_err(|error| self.reject(error))?;

        tracing::info!(document_bytes = document.declared_size, "Analyzing PDF content");
        self.run(PipelineMode::Summary, document, Instruction::summary_directive())
            .await
    }

    fn max_upload_bytes(&self) -> usize {
        self.validator.max_upload_bytes()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
