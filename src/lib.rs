#![deny(missing_docs)]

//! Core library for the StuTutor document Q&A API.

/// HTTP routing and REST handlers.
pub mod api;
/// Completion client abstraction and the Gemini adapter.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Success and failure envelopes returned to clients.
pub mod envelope;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline counters.
pub mod metrics;
/// Document validation and question-answering pipeline.
pub mod processing;
