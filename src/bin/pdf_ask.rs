//! Command-line entrypoint for the document pipeline.
//!
//! Runs the same validation and completion steps as the HTTP server against a local file and
//! prints the resulting envelope as JSON. Handy for checking credentials and prompts without a
//! browser. Shares all runtime configuration with the server binary.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};
use stututor::{
    completion::{CompletionClient, GeminiClient, GeminiSettings, RetryPolicy, RetryingClient},
    config, logging,
    envelope::{AnswerEnvelope, ErrorEnvelope, SummaryEnvelope},
    processing::{
        DocumentApi, DocumentService, DocumentValidator, PDF_MEDIA_TYPE, PipelineMode,
        UploadedDocument,
    },
};

#[derive(Parser)]
#[command(
    name = "pdf-ask",
    about = "Ask Gemini about a local PDF or summarize it"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a free-form question about the document.
    Ask {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        question: String,
    },
    /// Produce a comprehensive summary of the document.
    Summarize {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();
    config.log_summary();

    let gemini = GeminiClient::new(GeminiSettings::from(config))
        .context("failed to build Gemini client")?;
    let client: Arc<dyn CompletionClient> =
        Arc::new(RetryingClient::new(gemini, RetryPolicy::from(config)));
    let service = DocumentService::new(client, DocumentValidator::new(config.max_upload_bytes));

    let (mode, result) = match cli.command {
        Command::Ask { file, question } => {
            let document = load_document(&file).await?;
            (
                PipelineMode::Question,
                service
                    .answer(document, question)
                    .await
                    .map(|reply| serde_json::to_value(AnswerEnvelope::from_reply(reply))),
            )
        }
        Command::Summarize { file } => {
            let document = load_document(&file).await?;
            (
                PipelineMode::Summary,
                service
                    .summarize(document)
                    .await
                    .map(|reply| serde_json::to_value(SummaryEnvelope::from_reply(reply))),
            )
        }
    };

    match result {
        Ok(envelope) => {
            let envelope = envelope.context("failed to encode envelope")?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            let envelope = ErrorEnvelope::from_error(&error, mode);
            eprintln!("{}", serde_json::to_string_pretty(&envelope)?);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Read a file and declare its media type from the extension.
async fn load_document(path: &Path) -> Result<UploadedDocument> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let media_type = if is_pdf {
        PDF_MEDIA_TYPE
    } else {
        "application/octet-stream"
    };
    Ok(UploadedDocument::new(bytes, media_type))
}
