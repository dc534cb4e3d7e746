//! Upload checks run before any external call.

use super::types::{Instruction, PDF_MEDIA_TYPE, UploadedDocument, ValidationError};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;

/// Enforces media type, size ceiling, and instruction presence.
#[derive(Debug, Clone, Copy)]
pub struct DocumentValidator {
    max_upload_bytes: usize,
}

impl Default for DocumentValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl DocumentValidator {
    /// Build a validator with the given ceiling in bytes.
    pub const fn new(max_upload_bytes: usize) -> Self {
        Self { max_upload_bytes }
    }

    /// Configured ceiling in bytes.
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Media type and size checks, in that order.
    pub fn validate_document(&self, document: &UploadedDocument) -> Result<(), ValidationError> {
        if document.media_type != PDF_MEDIA_TYPE {
            return Err(ValidationError::UnsupportedMediaType {
                found: document.media_type.clone(),
            });
        }
        if document.declared_size > self.max_upload_bytes {
            return Err(ValidationError::PayloadTooLarge {
                size: document.declared_size,
                limit_bytes: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Full rule set for question answering: document checks, then the question.
    pub fn validate_question(
        &self,
        document: &UploadedDocument,
        question: &str,
    ) -> Result<Instruction, ValidationError> {
        self.validate_document(document)?;
        Instruction::parse(question).ok_or(ValidationError::MissingInstruction)
    }
}
