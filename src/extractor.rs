//! Turning raw page text into a validated [`NewsRecord`].
//!
//! [`LlmExtractor::extract`] runs four strictly sequential steps:
//!
//! 1. **Clean**: markup to normalized text ([`crate::cleaning`]); empty is terminal
//! 2. **Bound**: silently keep the first `max_text_length` characters
//! 3. **Call**: exactly one request to the [`CompletionService`], JSON mode if enabled
//! 4. **Validate**: decode the reply (with a fallback for wrapped JSON), require
//!    all four fields, reject records without title and content as `not-news`
//!
//! No step retries. Every failure comes back as a [`ParseFailure`] tagged with
//! the step it happened in; panics are caught and tagged `unknown`.

use crate::api::{ChatMessage, ChatRequest, CompletionService, ResponseFormat};
use crate::cleaning::{clean_html, truncate_chars};
use crate::config::ExtractionConfig;
use crate::error::ParseFailure;
use crate::models::NewsRecord;
use crate::utils::{REASON_LIMIT, bounded_reason, looks_truncated, panic_message, truncate_for_log};
use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, instrument, warn};

/// Fields every reply must contain, null or not.
pub const REQUIRED_FIELDS: [&str; 4] = ["title", "content", "publish_time", "author"];

/// Instruction sent as the system message of every extraction call.
pub const SYSTEM_PROMPT: &str = "\
You are a professional news parsing assistant. Follow these rules strictly:
1. Extract information only from the given text. Never invent or guess any data.
2. If the text is not a news report at all (for example a login prompt, a 404 or other error page, a CAPTCHA page, an advertisement, or a blank page), return every field with the value null.
3. If it is a news report, extract the following fields and return them as JSON:
   - title: the news headline (string, null if absent)
   - content: the body of the article (string, keep the core information, null if absent)
   - publish_time: the publication time in ISO 8601 format, e.g. 2026-02-20T14:30:00+08:00 (null if absent)
   - author: the author (string, null if absent)
4. Return exactly these four fields, no more and no fewer. The JSON must be strictly valid, with no explanation or any other text.";

/// Line placed before the page text in the user message.
pub const USER_PROMPT_PREFIX: &str =
    "Parse the following text and return JSON exactly as instructed:\n";

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

/// Something that can turn raw page text into a news record.
#[allow(async_fn_in_trait)]
pub trait Extractor {
    async fn extract(&self, raw_text: &str) -> Result<NewsRecord, ParseFailure>;
}

/// Extractor backed by a chat-completions service.
#[derive(Debug)]
pub struct LlmExtractor<S> {
    service: S,
    model: String,
    temperature: f32,
    max_text_length: usize,
    json_mode: bool,
}

impl<S> LlmExtractor<S> {
    /// Deterministic (temperature 0), JSON mode on, 8000-character input bound.
    pub fn new(service: S, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            temperature: 0.0,
            max_text_length: 8000,
            json_mode: true,
        }
    }

    pub fn from_config(service: S, config: &ExtractionConfig) -> Self {
        Self::new(service, config.model.clone())
            .with_temperature(config.temperature)
            .with_max_text_length(config.max_text_length)
            .with_json_mode(config.json_mode)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// A zero limit is raised to one character.
    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length.max(1);
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Cut cleaned text to the configured bound.
    fn bound<'a>(&self, cleaned: &'a str) -> &'a str {
        let bounded = truncate_chars(cleaned, self.max_text_length);
        if bounded.len() < cleaned.len() {
            warn!(
                original_chars = cleaned.chars().count(),
                max_text_length = self.max_text_length,
                "Cleaned text exceeds limit; truncating"
            );
        }
        bounded
    }

    /// The single request sent for `text`.
    ///
    /// # Arguments
    ///
    /// * `text` - Page text, already cleaned and bounded
    ///
    /// # Returns
    ///
    /// A chat request with [`SYSTEM_PROMPT`] as the system message,
    /// [`USER_PROMPT_PREFIX`] followed by `text` as the user message, the
    /// configured model and temperature, and `response_format: json_object`
    /// when JSON mode is on.
    pub fn build_request(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!("{USER_PROMPT_PREFIX}{text}")),
            ],
            temperature: self.temperature,
            response_format: self.json_mode.then(ResponseFormat::json_object),
        }
    }
}

impl<S: CompletionService> LlmExtractor<S> {
    async fn run(&self, raw_text: &str) -> Result<NewsRecord, ParseFailure> {
        debug!("Cleaning markup");
        let cleaned = clean_html(raw_text)
            .ok_or_else(|| ParseFailure::clean("no text left after cleaning the markup"))?;
        let bounded = self.bound(&cleaned);

        debug!(chars = bounded.chars().count(), json_mode = self.json_mode, "Calling extraction service");
        let request = self.build_request(bounded);
        let output = self
            .service
            .complete(&request)
            .await
            .map_err(|e| ParseFailure::extraction_call(e.to_string()))?;

        let output = output.trim();
        if output.is_empty() {
            return Err(ParseFailure::extraction_call(
                "service returned empty content",
            ));
        }
        decode_record(output)
    }
}

impl<S: CompletionService> Extractor for LlmExtractor<S> {
    #[instrument(level = "info", skip_all, fields(raw_bytes = raw_text.len(), model = %self.model))]
    async fn extract(&self, raw_text: &str) -> Result<NewsRecord, ParseFailure> {
        let result = AssertUnwindSafe(self.run(raw_text))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ParseFailure::unknown(format!(
                    "unexpected error: {}",
                    bounded_reason(panic_message(panic.as_ref()))
                )))
            });

        match &result {
            Ok(record) => info!(title = ?record.title, "Extracted news record"),
            Err(e) => error!(stage = %e.stage, reason = %e.reason, "Extraction failed"),
        }
        result
    }
}

/// Pull the JSON object out of a reply that may carry extra wrapping.
///
/// Tries a fenced ```` ```json ```` block first, then the span from the first
/// `{` to the last `}`, and otherwise returns the trimmed reply unchanged.
pub fn extract_json_block(output: &str) -> &str {
    if let Some(inner) = FENCED_JSON.captures(output).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }
    match (output.find('{'), output.rfind('}')) {
        (Some(start), Some(end)) if start < end => output[start..=end].trim(),
        _ => output.trim(),
    }
}

fn parse_reply(output: &str) -> Result<Value, ParseFailure> {
    if let Ok(value) = serde_json::from_str::<Value>(output) {
        return Ok(value);
    }
    let candidate = extract_json_block(output);
    serde_json::from_str::<Value>(candidate).map_err(|e| {
        let hint = if looks_truncated(&e) {
            " (output appears truncated)"
        } else {
            ""
        };
        ParseFailure::output_parse(format!(
            "JSON decode failed{hint}: {e}; raw output: {}",
            truncate_for_log(output, REASON_LIMIT)
        ))
    })
}

fn string_or_null(object: &Map<String, Value>, name: &str) -> Result<Option<String>, ParseFailure> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ParseFailure::output_parse(format!(
            "field `{name}` must be a string or null, got {}",
            truncate_for_log(&other.to_string(), REASON_LIMIT)
        ))),
    }
}

/// Decode and validate the service's reply.
///
/// # Errors
///
/// `output-parse` for undecodable output, a non-object, a missing field or a
/// field of the wrong type; `not-news` when title and content are both null.
pub fn decode_record(output: &str) -> Result<NewsRecord, ParseFailure> {
    let value = parse_reply(output)?;
    let object = value.as_object().ok_or_else(|| {
        ParseFailure::output_parse(format!(
            "expected a JSON object; raw output: {}",
            truncate_for_log(output, REASON_LIMIT)
        ))
    })?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(ParseFailure::output_parse(format!(
            "missing required fields {missing:?}; decoded: {}",
            truncate_for_log(&value.to_string(), REASON_LIMIT)
        )));
    }

    let extra: Vec<&String> = object
        .keys()
        .filter(|k| !REQUIRED_FIELDS.contains(&k.as_str()))
        .collect();
    if !extra.is_empty() {
        debug!(?extra, "Ignoring extra fields in reply");
    }

    let record = NewsRecord {
        title: string_or_null(object, "title")?,
        content: string_or_null(object, "content")?,
        publish_time: string_or_null(object, "publish_time")?,
        author: string_or_null(object, "author")?,
    };

    if record.is_blank() {
        return Err(ParseFailure::not_news(
            "page is not a news article (no title and no content)",
        ));
    }
    Ok(record)
}
