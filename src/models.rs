//! Data models for extracted news records and batch reports.
//!
//! - [`NewsRecord`]: the four-field record returned by the extraction service
//! - [`UrlOutcome`]: one pipeline's result, success or classified failure
//! - [`BatchReport`]: every outcome of a batch run plus summary counts
//!
//! `NewsRecord` field names are snake_case on the wire because that is the
//! exact schema the extraction instruction asks the model for.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// A structured news record extracted from a page.
///
/// Any field may be `null` when the page does not state it. A record with
/// both `title` and `content` null is never returned; the extractor turns it
/// into a `not-news` failure instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsRecord {
    /// The headline as it appears in the text.
    pub title: Option<String>,
    /// The article body, core information preserved.
    pub content: Option<String>,
    /// Publication timestamp in ISO 8601 (e.g. `2026-02-20T14:30:00+08:00`).
    pub publish_time: Option<String>,
    /// Byline.
    pub author: Option<String>,
}

impl NewsRecord {
    /// Whether the record carries neither a title nor a body.
    pub fn is_blank(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }
}

/// Result of running one URL through fetch-then-extract.
#[derive(Debug)]
pub struct UrlOutcome {
    /// The URL as given by the caller.
    pub url: String,
    pub result: Result<NewsRecord, PipelineError>,
}

impl UrlOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Serializable view of a [`UrlOutcome`].
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OutcomeReport {
    Ok {
        url: String,
        record: NewsRecord,
    },
    Failed {
        url: String,
        stage: String,
        reason: String,
    },
}

impl From<UrlOutcome> for OutcomeReport {
    fn from(outcome: UrlOutcome) -> Self {
        match outcome.result {
            Ok(record) => OutcomeReport::Ok {
                url: outcome.url,
                record,
            },
            Err(e) => OutcomeReport::Failed {
                url: outcome.url,
                stage: e.stage().to_string(),
                reason: e.reason(),
            },
        }
    }
}

/// Everything a batch run produced, written to stdout as JSON.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    /// RFC 3339 timestamp of report creation.
    pub generated_at: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// One entry per input URL, in input order.
    pub outcomes: Vec<OutcomeReport>,
}

impl BatchReport {
    pub fn new(generated_at: String, outcomes: Vec<UrlOutcome>) -> Self {
        let total = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        Self {
            generated_at,
            total,
            succeeded,
            failed: total - succeeded,
            outcomes: outcomes.into_iter().map(OutcomeReport::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ParseFailure};

    fn record() -> NewsRecord {
        NewsRecord {
            title: Some("T".to_string()),
            content: Some("C".to_string()),
            publish_time: None,
            author: None,
        }
    }

    #[test]
    fn test_news_record_preserves_nulls() {
        let json = serde_json::to_string(&record()).unwrap();
        assert_eq!(
            json,
            r#"{"title":"T","content":"C","publish_time":null,"author":null}"#
        );
    }

    #[test]
    fn test_is_blank() {
        let mut r = record();
        assert!(!r.is_blank());
        r.title = None;
        assert!(!r.is_blank());
        r.content = None;
        assert!(r.is_blank());
    }

    #[test]
    fn test_batch_report_counts_and_tags() {
        let outcomes = vec![
            UrlOutcome {
                url: "https://a.example/1".to_string(),
                result: Ok(record()),
            },
            UrlOutcome {
                url: "https://a.example/404".to_string(),
                result: Err(FetchError::Exhausted {
                    url: "https://a.example/404".to_string(),
                    attempts: 3,
                    last: crate::error::AttemptFailure::HttpStatus(404),
                }
                .into()),
            },
            UrlOutcome {
                url: "https://a.example/login".to_string(),
                result: Err(ParseFailure::not_news("no title and no content").into()),
            },
        ];

        let report = BatchReport::new("2026-02-20T00:00:00Z".to_string(), outcomes);
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["outcomes"][0]["status"], "ok");
        assert_eq!(value["outcomes"][0]["record"]["title"], "T");
        assert_eq!(value["outcomes"][1]["status"], "failed");
        assert_eq!(value["outcomes"][1]["stage"], "exhausted");
        assert_eq!(value["outcomes"][1]["reason"], "HTTP status 404");
        assert_eq!(value["outcomes"][2]["stage"], "not-news");
    }
}
