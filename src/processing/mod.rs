//! Document pipeline: upload validation, prompt assembly, and completion.

mod service;
pub mod types;
pub mod validation;

pub use service::{DocumentApi, DocumentService};
pub use types::{
    ErrorKind, Instruction, PDF_MEDIA_TYPE, PipelineMode, ProcessingError, SUMMARY_DIRECTIVE,
    UploadedDocument, ValidationError,
};
pub use validation::DocumentValidator;
