//! Page classifier: decides from raw text whether a page is worth analysing.
//!
//! Each signal is its own predicate so thresholds can be tuned and tested in
//! isolation; [`is_candidate_page`] only combines them.

use crate::config::ClassifierConfig;
use crate::normalize::has_line_number;

/// Count lines that start with a numeric token followed by whitespace.
pub fn count_numbered_lines(text: &str) -> usize {
    text.lines().filter(|line| has_line_number(line)).count()
}

/// At least `min` lines carry a line-number marker.
pub fn has_line_numbers(text: &str, min: usize) -> bool {
    count_numbered_lines(text) >= min
}

/// The text contains any keyword as a plain substring.
pub fn has_keywords(text: &str, keywords: &[String]) -> bool {
    contains_any(text, keywords)
}

/// The text contains a "Line Description" style marker.
pub fn has_description_marker(text: &str, markers: &[String]) -> bool {
    contains_any(text, markers)
}

/// The text names the scripting framework the listings are written for.
pub fn has_framework_tokens(text: &str, tokens: &[String]) -> bool {
    contains_any(text, tokens)
}

/// Per-signal verdicts, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct PageSignals {
    pub numbered_lines: usize,
    pub line_numbers: bool,
    pub keywords: bool,
    pub description_marker: bool,
    pub framework_tokens: bool,
}

impl PageSignals {
    pub fn is_candidate(&self) -> bool {
        (self.line_numbers && self.keywords) || self.description_marker || self.framework_tokens
    }
}

/// Evaluate every signal for a page's text.
pub fn page_signals(text: &str, config: &ClassifierConfig) -> PageSignals {
    let numbered_lines = count_numbered_lines(text);
    PageSignals {
        numbered_lines,
        line_numbers: numbered_lines >= config.min_numbered_lines,
        keywords: has_keywords(text, &config.keywords),
        description_marker: has_description_marker(text, &config.description_markers),
        framework_tokens: has_framework_tokens(text, &config.framework_tokens),
    }
}

/// Returns `true` when the page plausibly contains a code block.
///
/// Positive when numbered lines co-occur with a keyword, or when a
/// description marker or framework token is present. Empty text is never a
/// candidate.
pub fn is_candidate_page(text: &str, config: &ClassifierConfig) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    page_signals(text, config).is_candidate()
}

fn contains_any(text: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|needle| !needle.is_empty() && text.contains(needle.as_str()))
}
