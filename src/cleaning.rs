//! Reduction of raw markup to normalized plain text.
//!
//! The document is parsed with `scraper`, and every text node outside the
//! excluded elements is collected, one per line. Then:
//!
//! 1. runs of spaces/tabs collapse to a single space
//! 2. each line is trimmed and blank lines are dropped, so consecutive line
//!    breaks collapse to one
//!
//! Comments never contribute text, and neither do attributes, so `<meta>`
//! and friends vanish on their own.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

/// Elements whose whole subtree is dropped: code, styling, embedded frames,
/// and navigational chrome.
pub const EXCLUDED_ELEMENTS: [&str; 9] = [
    "script", "style", "noscript", "iframe", "template", "svg", "header", "footer", "nav",
];

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\f\v\x{A0}]+").unwrap());

/// Extract normalized text from `raw`. Returns `None` when nothing remains.
pub fn clean_html(raw: &str) -> Option<String> {
    let document = Html::parse_document(raw);
    let mut chunks = Vec::new();
    collect_text(document.root_element(), &mut chunks);
    let text = normalize_whitespace(&chunks.join("\n"));
    (!text.is_empty()).then_some(text)
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let text: &str = text;
            out.push(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if !EXCLUDED_ELEMENTS.contains(&name) {
                collect_text(child_element, out);
            }
        }
    }
}

/// Collapse horizontal whitespace, trim every line, and drop blank lines.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = HORIZONTAL_WS.replace_all(text, " ");
    collapsed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep at most the first `max_chars` characters of `text`.
///
/// Counts `char`s, not bytes, so the cut can never split a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}
