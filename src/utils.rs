//! Small helpers for bounded diagnostics and URL inspection.
//!
//! Foreign error messages and model output can be arbitrarily long. Anything
//! that ends up in a failure reason or a log field goes through
//! [`truncate_for_log`] first.

use std::any::Any;
use url::Url;

/// Maximum number of characters of foreign text embedded in a failure reason.
pub const REASON_LIMIT: usize = 200;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the dropped bytes appended. The cut always lands on a `char` boundary, so
/// multi-byte text (CJK pages are common) never panics.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Bound a foreign error message to [`REASON_LIMIT`] characters.
pub fn bounded_reason(s: impl std::fmt::Display) -> String {
    truncate_for_log(&s.to_string(), REASON_LIMIT)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the model response is cut off (e.g., due to token limits), the
/// resulting JSON will fail to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Host part of a URL, used as a log field. `None` for unparseable input.
///
/// For example: "https://news.163.com/26/0220/x.html" -> "news.163.com"
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "新闻".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with("新闻新…"));
        assert!(result.contains("(+51 bytes)"));
    }

    #[test]
    fn test_bounded_reason() {
        let long = "x".repeat(1000);
        assert!(bounded_reason(&long).chars().count() < 230);
        assert_eq!(bounded_reason("refused"), "refused");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let err = serde_json::from_str::<serde_json::Value>(json_eof).unwrap_err();
        assert!(looks_truncated(&err));

        let garbage = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        assert!(!looks_truncated(&garbage));
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| -> () { panic!("static message") }).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = std::panic::catch_unwind(|| -> () { panic!("formatted {}", 42) }).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://lite.cnn.com/2025/05/06/article"),
            Some("lite.cnn.com".to_string())
        );
        assert_eq!(host_of("not a url"), None);
    }
}
