//! Analysis report and human-facing summaries of a scan.

use serde::{Deserialize, Serialize};

use crate::types::{PageGap, PageNumber, Task, ValidatedBlock};

/// Number of code lines shown in a report preview.
pub const PREVIEW_LINES: usize = 3;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub id: usize,
    pub pages: Vec<PageNumber>,
    pub line_count: usize,
    pub has_description: bool,
    pub preview: String,
    pub screenshots: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub total_blocks: usize,
    pub with_description: usize,
    pub cross_page: usize,
    pub rejected: usize,
    pub gaps: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub total_pages: usize,
    pub code_blocks: Vec<BlockSummary>,
    pub statistics: Statistics,
}

/// Summarise the validated blocks of a run.
pub fn build_report(
    total_pages: usize,
    blocks: &[ValidatedBlock],
    rejected: usize,
    gaps: &[PageGap],
) -> Report {
    let code_blocks: Vec<BlockSummary> = blocks
        .iter()
        .enumerate()
        .map(|(index, block)| BlockSummary {
            id: index + 1,
            pages: block.pages.clone(),
            line_count: block.line_count,
            has_description: block.has_description,
            preview: block
                .lines
                .iter()
                .take(PREVIEW_LINES)
                .cloned()
                .collect::<Vec<_>>()
                .join("\n"),
            screenshots: block.screenshots.clone(),
        })
        .collect();

    let statistics = Statistics {
        total_blocks: blocks.len(),
        with_description: blocks.iter().filter(|b| b.has_description).count(),
        cross_page: blocks.iter().filter(|b| b.is_merged).count(),
        rejected,
        gaps: gaps.len(),
    };

    Report {
        total_pages,
        code_blocks,
        statistics,
    }
}

/// `p5` for a single page, `p5-6` for a span.
pub fn page_label(pages: &[PageNumber]) -> String {
    match (pages.first(), pages.last()) {
        (Some(first), Some(last)) if first != last => format!("p{}-{}", first, last),
        (Some(first), _) => format!("p{}", first),
        _ => "p?".to_string(),
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Total estimated lines across a task list.
pub fn total_estimated_lines(tasks: &[Task]) -> usize {
    tasks.iter().map(|t| t.estimated_lines).sum()
}
