//! HTTP surface for the StuTutor API.
//!
//! - `POST /pdf/ask` – Multipart `pdf` + `question`; answers the question from the document.
//! - `POST /pdf/analyze` – Multipart `pdf`; returns a comprehensive summary.
//! - `GET /hello` – Static greeting used as a liveness probe.
//! - `GET /` and `GET /health` – Service banner and health check.
//! - `GET /metrics` – Pipeline counters.
//!
//! Each document request must take a permit from the admission gate before its body is read, so
//! at most `max_concurrent_documents` payloads are buffered at once. Uploads are read chunk by
//! chunk and stop being buffered once they pass the ceiling. Bodies that overrun the request limit
//! are reported with the same ceiling message as any other oversize upload.

use crate::config::Config;
use crate::envelope::{AnswerEnvelope, ErrorEnvelope, SummaryEnvelope};
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    DocumentApi, ErrorKind, PipelineMode, ProcessingError, UploadedDocument, ValidationError,
};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{Field, MultipartError},
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

/// Room reserved for multipart framing and the question field on top of the document itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Router-level settings that are not part of the pipeline itself.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Origins allowed to make cross-origin requests.
    pub allowed_origins: Vec<String>,
    /// Number of document requests admitted at the same time.
    pub max_concurrent_documents: usize,
}

impl From<&Config> for ApiSettings {
    fn from(config: &Config) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            max_concurrent_documents: config.max_concurrent_documents,
        }
    }
}

struct AppState<S> {
    service: Arc<S>,
    gate: Arc<Semaphore>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<S> AppState<S> {
    async fn admit(&self) -> Result<OwnedSemaphorePermit, ProcessingError> {
        Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|_| ProcessingError::Internal("admission gate closed".to_string()))
    }
}

/// Build the HTTP router exposing the document API.
pub fn create_router<S>(service: Arc<S>, settings: &ApiSettings) -> Router
where
    S: DocumentApi + 'static,
{
    let body_limit = service
        .max_upload_bytes()
        .saturating_mul(2)
        .saturating_add(FORM_OVERHEAD_BYTES);
    let state = AppState {
        service,
        gate: Arc::new(Semaphore::new(settings.max_concurrent_documents.max(1))),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/hello", get(hello))
        .route("/metrics", get(get_metrics::<S>))
        .route("/pdf/ask", post(ask_pdf_question::<S>))
        .route("/pdf/analyze", post(analyze_pdf::<S>))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&settings.allowed_origins))
        .with_state(state)
}

/// Build the CORS layer from the configured origin list.
///
/// A literal `*` allows any origin; credentials are then disabled because browsers refuse the
/// combination.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let mirrored = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    if origins.iter().any(|origin| origin == "*") {
        return mirrored.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    mirrored
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the StuTutor API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from the StuTutor API!" }))
}

async fn get_metrics<S>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(state.service.metrics_snapshot())
}

/// Answer a question about an uploaded PDF.
async fn ask_pdf_question<S>(
    State(state): State<AppState<S>>,
    multipart: Multipart,
) -> Result<Json<AnswerEnvelope>, ApiError>
where
    S: DocumentApi,
{
    let mode = PipelineMode::Question;
    let span = tracing::info_span!("pdf_request", request_id = %Uuid::new_v4(), route = "/pdf/ask");
    async move {
        let _permit = state.admit().await.map_err(ApiError::for_mode(mode))?;
        let form = read_upload_form(multipart, state.service.max_upload_bytes())
            .await
            .map_err(|error| ApiError::new(error.into(), mode))?;
        let (document, question) = form
            .into_parts()
            .map_err(|error| ApiError::new(error.into(), mode))?;

        let reply = state
            .service
            .answer(document, question.unwrap_or_default())
            .await
            .map_err(ApiError::for_mode(mode))?;
        Ok(Json(AnswerEnvelope::from_reply(reply)))
    }
    .instrument(span)
    .await
}

/// Summarize an uploaded PDF.
async fn analyze_pdf<S>(
    State(state): State<AppState<S>>,
    multipart: Multipart,
) -> Result<Json<SummaryEnvelope>, ApiError>
where
    S: DocumentApi,
{
    let mode = PipelineMode::Summary;
    let span =
        tracing::info_span!("pdf_request", request_id = %Uuid::new_v4(), route = "/pdf/analyze");
    async move {
        let _permit = state.admit().await.map_err(ApiError::for_mode(mode))?;
        let form = read_upload_form(multipart, state.service.max_upload_bytes())
            .await
            .map_err(|error| ApiError::new(error.into(), mode))?;
        let (document, _) = form
            .into_parts()
            .map_err(|error| ApiError::new(error.into(), mode))?;

        let reply = state
            .service
            .summarize(document)
            .await
            .map_err(ApiError::for_mode(mode))?;
        Ok(Json(SummaryEnvelope::from_reply(reply)))
    }
    .instrument(span)
    .await
}

/// Fields collected from a multipart upload.
#[derive(Debug, Default)]
struct UploadForm {
    document: Option<UploadedDocument>,
    question: Option<String>,
}

impl UploadForm {
    /// Split into the document, which must be present, and the optional question.
    fn into_parts(self) -> Result<(UploadedDocument, Option<String>), ValidationError> {
        let document = self.document.ok_or_else(|| {
            ValidationError::MalformedRequest("Field 'pdf' is required".to_string())
        })?;
        Ok((document, self.question))
    }
}

async fn read_upload_form(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> Result<UploadForm, ValidationError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|error| form_error(error, max_upload_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "pdf" => {
                let media_type = field.content_type().unwrap_or_default().to_string();
                let upload = read_capped(&mut field, max_upload_bytes).await?;
                form.document = Some(UploadedDocument {
                    bytes: upload.bytes,
                    media_type,
                    declared_size: upload.total,
                });
                if upload.truncated {
                    // The body limit cut the stream; the document is already known to be oversize.
                    return Ok(form);
                }
            }
            "question" => {
                form.question = Some(
                    field
                        .text()
                        .await
                        .map_err(|error| form_error(error, max_upload_bytes))?,
                );
            }
            other => {
                tracing::debug!(field = other, "Ignoring unexpected form field");
            }
        }
    }
    Ok(form)
}

/// Bytes kept from a file field plus the number of bytes seen.
struct CappedRead {
    bytes: Vec<u8>,
    total: usize,
    truncated: bool,
}

/// Read a field to the end, buffering at most `limit` bytes but counting all of them.
///
/// Hitting the request body limit ends the read early with a total past the ceiling.
async fn read_capped(field: &mut Field<'_>, limit: usize) -> Result<CappedRead, ValidationError> {
    let mut buffer = Vec::new();
    let mut total: usize = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(error) if exceeds_body_limit(&error) => {
                return Ok(CappedRead {
                    bytes: Vec::new(),
                    total: total.max(limit.saturating_add(1)),
                    truncated: true,
                });
            }
            Err(error) => return Err(malformed(error)),
        };
        total = total.saturating_add(chunk.len());
        if total <= limit {
            buffer.extend_from_slice(&chunk);
        } else if !buffer.is_empty() {
            buffer = Vec::new();
        }
    }
    Ok(CappedRead {
        bytes: buffer,
        total,
        truncated: false,
    })
}

fn exceeds_body_limit(error: &MultipartError) -> bool {
    error.status() == StatusCode::PAYLOAD_TOO_LARGE
}

/// Map a multipart failure, reporting body-limit overruns against the upload ceiling.
fn form_error(error: MultipartError, max_upload_bytes: usize) -> ValidationError {
    if exceeds_body_limit(&error) {
        ValidationError::PayloadTooLarge {
            size: max_upload_bytes.saturating_add(1),
            limit_bytes: max_upload_bytes,
        }
    } else {
        malformed(error)
    }
}

fn malformed(error: impl std::fmt::Display) -> ValidationError {
    ValidationError::MalformedRequest(format!("Invalid form data: {error}"))
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
        ErrorKind::Upstream | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Pipeline error tagged with the endpoint it came from.
struct ApiError {
    error: ProcessingError,
    mode: PipelineMode,
}

impl ApiError {
    fn new(error: ProcessingError, mode: PipelineMode) -> Self {
        Self { error, mode }
    }

    fn for_mode(mode: PipelineMode) -> impl Fn(ProcessingError) -> Self {
        move |error| Self::new(error, mode)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.error.kind());
        if status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
        }
        (status, Json(ErrorEnvelope::from_error(&self.error, self.mode))).into_response()
    }
}
