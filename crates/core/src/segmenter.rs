//! Line-block segmenter: turns a page's text layer into at most one block.

use crate::config::SegmenterConfig;
use crate::normalize::{clean_code_line, has_line_number, is_description_marker, strip_line_number};
use crate::types::{PageNumber, RawBlock};

/// Split a page's text into numbered code lines and trailing description.
///
/// Numbered lines form the code run. Unnumbered lines between them (wrapped
/// lines, running heads) are skipped. Once a description marker is seen, every
/// following non-empty line belongs to the description. Returns `None` when no
/// code line was found.
///
/// The block is flagged `continued` when its last code line is one of the
/// final `bottom_window` lines of the page.
pub fn segment_page(
    page: PageNumber,
    text: &str,
    markers: &[String],
    config: &SegmenterConfig,
) -> Option<RawBlock> {
    let lines: Vec<&str> = text.lines().collect();

    let mut code = Vec::new();
    let mut description = Vec::new();
    let mut last_code_index: Option<usize> = None;
    let mut in_description = false;

    for (index, line) in lines.iter().enumerate() {
        if in_description {
            if !line.trim().is_empty() {
                description.push(line.trim_end().to_string());
            }
            continue;
        }

        if is_description_marker(line, markers) {
            in_description = true;
            continue;
        }

        if has_line_number(line) {
            code.push(clean_code_line(strip_line_number(line)));
            last_code_index = Some(index);
        }
    }

    let last = last_code_index?;
    let continued = last + config.bottom_window >= lines.len();

    Some(RawBlock::from_text(
        page,
        code,
        description.join("\n"),
        continued,
    ))
}
