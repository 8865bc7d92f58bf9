//! Page text extraction.
//!
//! Walks a page's content stream with a reduced text-state machine, collects
//! positioned spans and folds them into lines ordered top to bottom:
//!
//! ```text
//! content ops  ->  TextSpan[]  ->  TextLine[]  ->  page text
//! ```
//!
//! Listings keep their printed line numbers as separate spans at the left
//! margin; they end up at the start of their line, separated by a space.

use std::cmp::Ordering;

use super::backend::{ContentOp, PageId, PdfBackend, PdfValue};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A run of text drawn at one position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub font_size: f32,
}

/// Spans sharing a baseline, left to right.
#[derive(Debug, Clone, Default)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
    pub y: f32,
    pub x: f32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Baselines closer than this (points) belong to the same line.
const Y_TOLERANCE: f32 = 1.0;

/// Glyph advance as a fraction of the font size, used in place of real
/// glyph widths.
const APPROX_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Horizontal gap (points) above which two spans are separate words.
const MIN_WORD_GAP: f32 = 1.5;

const IDENTITY_MATRIX: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

// ---------------------------------------------------------------------------
// CJK helper
// ---------------------------------------------------------------------------

/// Scripts written without inter-word spaces (CJK, kana, hangul, fullwidth
/// forms, Thai).
pub fn is_spaceless_script_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0xF900..=0xFAFF
            | 0x3040..=0x30FF
            | 0x31F0..=0x31FF
            | 0xAC00..=0xD7AF
            | 0x1100..=0x11FF
            | 0x3130..=0x318F
            | 0x3000..=0x303F
            | 0xFF00..=0xFFEF
            | 0x0E00..=0x0E7F
    )
}

// ---------------------------------------------------------------------------
// Text-state machine
// ---------------------------------------------------------------------------

/// Collects spans while replaying text operators.
struct SpanCollector<'a> {
    backend: &'a dyn PdfBackend,
    page: PageId,
    font_key: Vec<u8>,
    font_size: f32,
    /// [a, b, c, d, tx, ty]
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    text_rise: f32,
    leading: f32,
    spans: Vec<TextSpan>,
}

impl<'a> SpanCollector<'a> {
    fn new(backend: &'a dyn PdfBackend, page: PageId) -> Self {
        SpanCollector {
            backend,
            page,
            font_key: Vec::new(),
            font_size: 0.0,
            text_matrix: IDENTITY_MATRIX,
            line_matrix: IDENTITY_MATRIX,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            text_rise: 0.0,
            leading: 0.0,
            spans: Vec::new(),
        }
    }

    fn apply(&mut self, op: &ContentOp) {
        match op.operator.as_str() {
            "BT" => {
                self.text_matrix = IDENTITY_MATRIX;
                self.line_matrix = IDENTITY_MATRIX;
            }
            "Tf" => self.set_font(op),
            "Tm" => {
                let values: Vec<f32> = (0..6).filter_map(|i| op.number(i)).collect();
                if let [a, b, c, d, e, f] = values.as_slice() {
                    self.text_matrix = [*a, *b, *c, *d, *e, *f];
                    self.line_matrix = self.text_matrix;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    self.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "T*" => self.next_line(0.0, -self.leading),
            "TL" => self.leading = op.number(0).unwrap_or(self.leading),
            "Tc" => self.char_spacing = op.number(0).unwrap_or(self.char_spacing),
            "Tw" => self.word_spacing = op.number(0).unwrap_or(self.word_spacing),
            "Tz" => {
                if let Some(scale) = op.number(0) {
                    self.horiz_scale = scale / 100.0;
                }
            }
            "Ts" => self.text_rise = op.number(0).unwrap_or(self.text_rise),
            "Tj" => {
                if let Some(operand) = op.operands.first() {
                    self.show(operand);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = op.operands.first() {
                    self.show_array(items);
                }
            }
            "'" => {
                self.next_line(0.0, -self.leading);
                if let Some(operand) = op.operands.first() {
                    self.show(operand);
                }
            }
            "\"" => {
                if op.operands.len() >= 3 {
                    self.word_spacing = op.number(0).unwrap_or(self.word_spacing);
                    self.char_spacing = op.number(1).unwrap_or(self.char_spacing);
                    self.next_line(0.0, -self.leading);
                    self.show(&op.operands[2]);
                }
            }
            _ => {}
        }
    }

    fn set_font(&mut self, op: &ContentOp) {
        let key = match op.operands.first() {
            Some(PdfValue::Name(n)) | Some(PdfValue::Str(n)) => n.clone(),
            _ => return,
        };
        self.font_size = op.number(1).unwrap_or(0.0);
        self.font_key = key;
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        let m = self.line_matrix;
        self.line_matrix[4] = m[0] * tx + m[2] * ty + m[4];
        self.line_matrix[5] = m[1] * tx + m[3] * ty + m[5];
        self.text_matrix = self.line_matrix;
    }

    fn advance(&mut self, dx: f32) {
        self.text_matrix[4] += dx * self.text_matrix[0];
        self.text_matrix[5] += dx * self.text_matrix[1];
    }

    fn glyph_width(&self) -> f32 {
        self.font_size * APPROX_CHAR_WIDTH_RATIO * self.horiz_scale
    }

    /// Rendered size: font size scaled by the matrix' vertical factor.
    fn effective_font_size(&self) -> f32 {
        let m = self.text_matrix;
        (self.font_size * (m[1].powi(2) + m[3].powi(2)).sqrt()).abs()
    }

    fn decode(&self, operand: &PdfValue) -> String {
        match operand {
            PdfValue::Str(bytes) => self.backend.decode_text(self.page, &self.font_key, bytes),
            _ => String::new(),
        }
    }

    /// Advance past `text`, returning the displacement.
    fn advance_over(&mut self, text: &str) -> f32 {
        let dx: f32 = text
            .chars()
            .map(|c| {
                let spacing = if c == ' ' { self.word_spacing } else { 0.0 };
                self.glyph_width() + self.char_spacing + spacing
            })
            .sum();
        self.advance(dx);
        dx
    }

    fn push_span(&mut self, text: &str, x: f32, y: f32) {
        let text = text.trim_end();
        if text.is_empty() {
            return;
        }
        self.spans.push(TextSpan {
            text: text.to_string(),
            x,
            y,
            width: text.chars().count() as f32 * self.glyph_width(),
            font_size: self.effective_font_size(),
        });
    }

    fn show(&mut self, operand: &PdfValue) {
        let text = self.decode(operand);
        let (x, y) = (self.text_matrix[4], self.text_matrix[5] + self.text_rise);
        self.push_span(&text, x, y);
        self.advance_over(&text);
    }

    /// `TJ`: strings interleaved with kerning in thousandths of text space.
    /// A large negative kern is read as a word break.
    fn show_array(&mut self, items: &[PdfValue]) {
        let mut buffer = String::new();
        let mut x = self.text_matrix[4];
        let y = self.text_matrix[5] + self.text_rise;

        for item in items {
            if let PdfValue::Str(_) = item {
                let fragment = self.decode(item);
                if buffer.is_empty() {
                    x = self.text_matrix[4];
                }
                buffer.push_str(&fragment);
                self.advance_over(&fragment);
            } else if let Some(kern) = super::backend::get_number_from_value(item) {
                let dx = -kern / 1000.0 * self.font_size * self.horiz_scale;
                if dx > self.glyph_width() * 0.3 && !buffer.is_empty() {
                    buffer.push(' ');
                }
                self.advance(dx);
            }
        }

        self.push_span(&buffer, x, y);
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Replay `ops` and return every text span they draw.
pub fn collect_spans(backend: &dyn PdfBackend, page: PageId, ops: &[ContentOp]) -> Vec<TextSpan> {
    let mut collector = SpanCollector::new(backend, page);
    for op in ops {
        collector.apply(op);
    }
    collector.spans
}

/// All text spans of one page.
pub fn extract_page_spans(backend: &dyn PdfBackend, page: PageId) -> Result<Vec<TextSpan>, PdfError> {
    let ops = backend.page_ops(page)?;
    Ok(collect_spans(backend, page, &ops))
}

/// Fold spans into lines, top of the page first (PDF y grows upwards).
pub fn group_spans_into_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    spans.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Vec<TextSpan> = Vec::new();

    for span in spans {
        let same_line = current
            .first()
            .is_some_and(|first| (span.y - first.y).abs() <= Y_TOLERANCE);
        if !same_line && !current.is_empty() {
            lines.push(assemble_line(std::mem::take(&mut current)));
        }
        current.push(span);
    }
    if !current.is_empty() {
        lines.push(assemble_line(current));
    }

    lines
}

/// Join touching spans of a line; keep distant ones apart so [`TextLine::text`]
/// separates them with a space.
fn assemble_line(mut spans: Vec<TextSpan>) -> TextLine {
    spans.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));

    let mut merged: Vec<TextSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(prev) = merged.last_mut() {
            let gap = span.x - (prev.x + prev.width);
            let same_size = (prev.font_size - span.font_size).abs() < 0.5;
            if same_size && gap > -prev.font_size && gap < prev.font_size * 2.0 {
                if gap >= MIN_WORD_GAP && !boundary_is_spaceless(prev, &span) {
                    prev.text.push(' ');
                }
                prev.text.push_str(&span.text);
                prev.width = (span.x + span.width) - prev.x;
                continue;
            }
        }
        merged.push(span);
    }

    TextLine {
        y: merged.first().map(|s| s.y).unwrap_or(0.0),
        x: merged.first().map(|s| s.x).unwrap_or(0.0),
        spans: merged,
    }
}

fn boundary_is_spaceless(prev: &TextSpan, next: &TextSpan) -> bool {
    match (prev.text.chars().next_back(), next.text.chars().next()) {
        (Some(l), Some(f)) => is_spaceless_script_char(l) && is_spaceless_script_char(f),
        _ => false,
    }
}

/// Page text as newline-separated lines, top to bottom.
pub fn page_text(backend: &dyn PdfBackend, page: PageId) -> Result<String, PdfError> {
    let lines = group_spans_into_lines(extract_page_spans(backend, page)?);
    Ok(lines
        .iter()
        .map(TextLine::text)
        .collect::<Vec<_>>()
        .join("\n"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
