//! Text clean-up shared by the segmenter, the validator and OCR post-processing.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Full-width punctuation that recognition and CJK typesetting commonly put
/// in place of the ASCII characters code listings actually use.
const PUNCTUATION_FIXES: [(char, char); 4] = [
    ('\u{FF0E}', '.'),
    ('\u{FF0C}', ','),
    ('\u{FF08}', '('),
    ('\u{FF09}', ')'),
];

fn line_number_regex() -> &'static Regex {
    static RE_LINE_NUMBER: OnceLock<Regex> = OnceLock::new();
    RE_LINE_NUMBER.get_or_init(|| Regex::new(r"^\s*\d+\s+").unwrap())
}

/// Returns `true` if `line` starts with a numeric token followed by whitespace.
pub fn has_line_number(line: &str) -> bool {
    line_number_regex().is_match(line)
}

/// Remove a leading line-number token (and the whitespace after it).
///
/// Lines without a token are returned unchanged.
pub fn strip_line_number(line: &str) -> &str {
    match line_number_regex().find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

/// Replace misrecognised full-width punctuation with its ASCII form.
pub fn fix_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| {
            PUNCTUATION_FIXES
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Normalise one code line: NFC, punctuation fixes, trailing whitespace removed.
///
/// Leading whitespace is left alone. Lines that went through
/// [`strip_line_number`] have already lost it with the separator.
pub fn clean_code_line(line: &str) -> String {
    let normalized: String = line.nfc().collect();
    fix_punctuation(&normalized).trim_end().to_string()
}

/// Returns `true` if the line contains one of the description markers.
///
/// A numbered line is always code, even when it mentions a marker (a comment
/// or a string literal such as `print("說明")`).
pub fn is_description_marker(line: &str, markers: &[String]) -> bool {
    !has_line_number(line) && markers.iter().any(|m| line.contains(m.as_str()))
}

/// Split recognised text from a code-block image into code and description.
///
/// Everything before the first description marker is code: numbering is
/// stripped, punctuation is fixed, and empty or number-only lines are dropped.
/// Non-empty lines after the marker form the description.
pub fn clean_ocr_text(raw: &str, markers: &[String]) -> (Vec<String>, String) {
    let mut code = Vec::new();
    let mut description = Vec::new();
    let mut in_description = false;

    for line in raw.lines() {
        if is_description_marker(line, markers) {
            in_description = true;
            continue;
        }

        if in_description {
            if !line.trim().is_empty() {
                description.push(line.trim_end().to_string());
            }
            continue;
        }

        // A bare number is an empty numbered line.
        if line.trim().chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let cleaned = clean_code_line(strip_line_number(line));
        if !cleaned.trim().is_empty() {
            code.push(cleaned);
        }
    }

    (code, description.join("\n"))
}
