//! Error taxonomy shared by the fetch and extraction stages.
//!
//! Failures are tagged variants, not strings: every error exposes a stable
//! kebab-case discriminant (`kind()` / `stage()`) that callers switch on, plus
//! a human-readable reason.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure of a single HTTP attempt. All of these are retried by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    /// The server answered with a status outside 200–299.
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// The attempt exceeded its timeout.
    #[error("request timed out")]
    Timeout,
    /// DNS failure or refused connection.
    #[error("connection failed (DNS/refused): {0}")]
    Connect(String),
    /// Anything else the transport reported (bounded message).
    #[error("unknown transport error: {0}")]
    Transport(String),
}

impl AttemptFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::HttpStatus(_) => "http-status",
            AttemptFailure::Timeout => "timeout",
            AttemptFailure::Connect(_) => "connect-failure",
            AttemptFailure::Transport(_) => "unknown-transport-error",
        }
    }
}

/// Terminal outcome of [`crate::fetcher::Fetcher::fetch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The payload arrived but the content validator refused it. Never retried.
    #[error("content validation failed for {url}: {reason}")]
    ContentRejected { url: String, reason: String },
    /// Every attempt failed; carries the last attempt's failure.
    #[error("all {attempts} fetch attempts failed for {url}: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: AttemptFailure,
    },
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::ContentRejected { .. } => "content-rejected",
            FetchError::Exhausted { .. } => "exhausted",
        }
    }

    /// The failure of the final attempt, if the fetch ran out of attempts.
    pub fn last_attempt(&self) -> Option<&AttemptFailure> {
        match self {
            FetchError::Exhausted { last, .. } => Some(last),
            FetchError::ContentRejected { .. } => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::ContentRejected { url, .. } | FetchError::Exhausted { url, .. } => url,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            FetchError::ContentRejected { reason, .. } => reason.clone(),
            FetchError::Exhausted { last, .. } => last.to_string(),
        }
    }
}

/// Step of the extraction at which a [`ParseFailure`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseStage {
    /// No extractable text in the markup.
    Clean,
    /// The extraction service was unreachable, erroring, or timed out.
    ExtractionCall,
    /// The service output was malformed or incomplete.
    OutputParse,
    /// Well-formed output judging the page not to be a news article.
    NotNews,
    Unknown,
}

impl ParseStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStage::Clean => "clean",
            ParseStage::ExtractionCall => "extraction-call",
            ParseStage::OutputParse => "output-parse",
            ParseStage::NotNews => "not-news",
            ParseStage::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of [`crate::extractor::Extractor::extract`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse failed ({stage}): {reason}")]
pub struct ParseFailure {
    pub stage: ParseStage,
    pub reason: String,
}

impl ParseFailure {
    pub fn new(stage: ParseStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }

    pub fn clean(reason: impl Into<String>) -> Self {
        Self::new(ParseStage::Clean, reason)
    }

    pub fn extraction_call(reason: impl Into<String>) -> Self {
        Self::new(ParseStage::ExtractionCall, reason)
    }

    pub fn output_parse(reason: impl Into<String>) -> Self {
        Self::new(ParseStage::OutputParse, reason)
    }

    pub fn not_news(reason: impl Into<String>) -> Self {
        Self::new(ParseStage::NotNews, reason)
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new(ParseStage::Unknown, reason)
    }
}

/// Failure of one fetch-then-extract run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    /// A panic escaped one of the stages; the rest of the batch is unaffected.
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl PipelineError {
    /// Fetch kind or parse stage, whichever failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Fetch(e) => e.kind(),
            PipelineError::Parse(e) => e.stage.as_str(),
            PipelineError::Unknown(_) => ParseStage::Unknown.as_str(),
        }
    }

    pub fn reason(&self) -> String {
        match self {
            PipelineError::Fetch(e) => e.reason(),
            PipelineError::Parse(e) => e.reason.clone(),
            PipelineError::Unknown(reason) => reason.clone(),
        }
    }
}

/// Startup/configuration problems. These are the only errors that stop the binary.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_kinds() {
        let rejected = FetchError::ContentRejected {
            url: "https://example.com".to_string(),
            reason: "payload too small (12 bytes)".to_string(),
        };
        assert_eq!(rejected.kind(), "content-rejected");
        assert!(rejected.last_attempt().is_none());

        let exhausted = FetchError::Exhausted {
            url: "https://example.com".to_string(),
            attempts: 3,
            last: AttemptFailure::HttpStatus(503),
        };
        assert_eq!(exhausted.kind(), "exhausted");
        assert_eq!(exhausted.last_attempt().map(|f| f.kind()), Some("http-status"));
        assert_eq!(exhausted.reason(), "HTTP status 503");
        assert!(exhausted.to_string().contains("all 3 fetch attempts failed"));
    }

    #[test]
    fn test_attempt_failure_kinds() {
        assert_eq!(AttemptFailure::Timeout.kind(), "timeout");
        assert_eq!(AttemptFailure::Connect("refused".into()).kind(), "connect-failure");
        assert_eq!(
            AttemptFailure::Transport("boom".into()).kind(),
            "unknown-transport-error"
        );
    }

    #[test]
    fn test_parse_stage_tags() {
        assert_eq!(ParseStage::ExtractionCall.to_string(), "extraction-call");
        assert_eq!(
            serde_json::to_string(&ParseStage::NotNews).unwrap(),
            "\"not-news\""
        );
    }

    #[test]
    fn test_pipeline_error_discriminants() {
        let err: PipelineError = ParseFailure::not_news("no title and no content").into();
        assert_eq!(err.stage(), "not-news");
        assert_eq!(err.reason(), "no title and no content");

        let err: PipelineError = FetchError::ContentRejected {
            url: "u".into(),
            reason: "r".into(),
        }
        .into();
        assert_eq!(err.stage(), "content-rejected");
    }
}
