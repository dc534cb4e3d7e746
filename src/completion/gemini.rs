//! Gemini `generateContent` adapter.
//!
//! The document travels inline as base64 `inline_data`, followed by the instruction as a text
//! part, inside a single user turn. The API key goes in the `x-goog-api-key` header so it never
//! shows up in URLs or error messages.

use super::{CompletionClient, ModelReply, PromptRequest, UpstreamError};
use crate::config::Config;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// Secret sent with every request.
    pub api_key: String,
    /// Model identifier, with or without the `models/` prefix.
    pub model: String,
    /// REST base URL, e.g. `https://generativelanguage.googleapis.com/v1beta`.
    pub base_url: String,
    /// Timeout applied to each call.
    pub timeout: Duration,
}

impl From<&Config> for GeminiSettings {
    fn from(config: &Config) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            base_url: config.gemini_base_url.clone(),
            timeout: config.completion_timeout,
        }
    }
}

/// Completion client backed by the Gemini REST API.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Construct a client; the underlying connection pool is shared by all requests.
    pub fn new(settings: GeminiSettings) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .user_agent(concat!("stututor/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|error| {
                UpstreamError::permanent(format!("failed to build HTTP client: {error}"))
            })?;

        tracing::debug!(
            base_url = %settings.base_url,
            model = %settings.model,
            timeout_secs = settings.timeout.as_secs(),
            has_api_key = !settings.api_key.is_empty(),
            "Initialized Gemini client"
        );

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model,
            api_key: settings.api_key,
            timeout: settings.timeout,
        })
    }

    fn endpoint(&self) -> String {
        let model_path = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!("{}/{}:generateContent", self.base_url, model_path)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, request: &PromptRequest) -> Result<ModelReply, UpstreamError> {
        let encoded = STANDARD.encode(&request.document);
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [
                    Part::InlineData {
                        inline_data: Blob {
                            mime_type: &request.media_type,
                            data: &encoded,
                        },
                    },
                    Part::Text {
                        text: &request.instruction,
                    },
                ],
            }],
        };

        tracing::info!(
            model = %self.model,
            document_bytes = request.document.len(),
            "Requesting completion from Gemini"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    UpstreamError::transient(format!(
                        "Gemini request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    UpstreamError::transient(format!(
                        "failed to reach Gemini: {}",
                        error.without_url()
                    ))
                }
            })?;

        let status = response.status();
        let payload = response.text().await.map_err(|error| {
            UpstreamError::transient(format!(
                "failed to read Gemini response: {}",
                error.without_url()
            ))
        })?;

        if !status.is_success() {
            let cause = format!(
                "Gemini API error ({status}): {}",
                extract_api_error(&payload)
            );
            return Err(if is_transient(status) {
                UpstreamError::transient(cause)
            } else {
                UpstreamError::permanent(cause)
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&payload).map_err(|error| {
            UpstreamError::permanent(format!("malformed Gemini response: {error}"))
        })?;
        let model = parsed
            .model_version
            .clone()
            .filter(|version| !version.is_empty())
            .unwrap_or_else(|| self.model.trim_start_matches("models/").to_string());
        let text = parsed.into_text()?;

        tracing::info!(model = %model, answer_chars = text.len(), "Gemini completion succeeded");
        Ok(ModelReply { text, model })
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Pull a readable message out of a Gemini error envelope, falling back to the raw body.
fn extract_api_error(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: Option<ApiError>,
    }
    #[derive(Deserialize)]
    struct ApiError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i64>,
    }

    if let Ok(ErrorEnvelope { error: Some(error) }) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = error.message.unwrap_or_else(|| "unknown error".to_string());
        let status = error.status.unwrap_or_else(|| "unknown".to_string());
        let code = error
            .code
            .map(|value| value.to_string())
            .unwrap_or_else(|| "none".to_string());
        return format!("{message} (status={status}, code={code})");
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(500).collect()
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData { inline_data: Blob<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenate the text parts of the first candidate.
    fn into_text(self) -> Result<String, UpstreamError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .map(|reason| format!("prompt blocked by Gemini ({reason})"))
                .unwrap_or_else(|| "Gemini returned no candidates".to_string());
            return Err(UpstreamError::permanent(reason));
        };

        let text: String = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
            return Err(UpstreamError::permanent(format!(
                "Gemini returned no text (finish reason {reason})"
            )));
        }

        Ok(text)
    }
}
