//! Structured-extraction service interaction over an OpenAI-compatible API.
//!
//! # Architecture
//!
//! - [`CompletionService`]: core trait, one chat request in, one text reply out
//! - [`OpenAiChatClient`]: `reqwest` implementation against `{base_url}/chat/completions`
//!
//! Unlike the fetcher, nothing here retries. A failed call is reported once,
//! classified as a [`ServiceError`], and the extractor maps it to the
//! `extraction-call` stage.

use crate::utils::{bounded_reason, truncate_for_log};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// One message of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// `response_format` field of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    /// Native JSON mode: the service must return a single JSON object.
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

/// Chat-completions request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Why a call to the extraction service failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed (network/address error): {0}")]
    Connect(String),
    /// The service answered with a non-2xx status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    /// 2xx, but the body was not a usable chat completion.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

/// Trait for the external structured-extraction service.
///
/// Implementors send the request once and return the assistant message text.
#[allow(async_fn_in_trait)]
pub trait CompletionService {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ServiceError>;
}

/// `reqwest` client for any OpenAI-compatible chat-completions endpoint
/// (OpenAI, Zhipu, Qwen, a local vLLM/llama.cpp server, ...).
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiChatClient {
    /// Build the shared client. `timeout` bounds each call end to end.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout)
        } else if e.is_connect() {
            ServiceError::Connect(bounded_reason(&e))
        } else {
            ServiceError::Other(bounded_reason(&e))
        }
    }
}

impl CompletionService for OpenAiChatClient {
    #[instrument(level = "info", skip_all, fields(model = %request.model, endpoint = %self.endpoint))]
    async fn complete(&self, request: &ChatRequest) -> Result<String, ServiceError> {
        let t0 = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        let elapsed_ms = t0.elapsed().as_millis();

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| bounded_reason(b.error.message))
                .unwrap_or_else(|_| bounded_reason(&body));
            warn!(elapsed_ms, status = status.as_u16(), %message, "API call failed");
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            ServiceError::InvalidResponse(format!(
                "{e} (body: {})",
                truncate_for_log(&body, 200)
            ))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::InvalidResponse("response carried no message".to_string()))?;

        info!(elapsed_ms, chars = content.chars().count(), "Chat completion succeeded");
        Ok(content)
    }
}
