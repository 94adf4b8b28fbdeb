//! # News Extract
//!
//! A two-stage pipeline that turns news page URLs into structured records:
//!
//! 1. **Fetching** ([`fetcher`]): HTTP GET with rotated browser identities,
//!    exponential backoff on transient failures, and a payload validator that
//!    rejects soft-404s without retrying
//! 2. **Extraction** ([`extractor`]): markup cleaning, input bounding, one call
//!    to an OpenAI-compatible model in JSON mode, and strict validation of the
//!    reply into a [`NewsRecord`]
//!
//! [`Pipeline`] composes the two and runs many URLs concurrently, collecting a
//! classified outcome for every one of them.
//!
//! The library never installs a tracing subscriber; events go to whatever
//! subscriber the embedding application sets up.

pub mod api;
pub mod cleaning;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{CompletionService, OpenAiChatClient};
pub use config::AppConfig;
pub use error::{AttemptFailure, ConfigError, FetchError, ParseFailure, ParseStage, PipelineError};
pub use extractor::{Extractor, LlmExtractor};
pub use fetcher::{ContentValidator, Fetcher, HttpFetcher, RetryPolicy};
pub use models::{BatchReport, NewsRecord, UrlOutcome};
pub use pipeline::Pipeline;
