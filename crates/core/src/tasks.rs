//! Task materializer: numbers validated blocks and names their output files.

use crate::config::TaskNaming;
use crate::types::{PageNumber, Task, ValidatedBlock};

/// Deterministic output name, e.g. `code_007_p31.py`.
pub fn output_name(id: usize, first_page: PageNumber, naming: &TaskNaming) -> String {
    let stem = format!("{}_{:03}_p{}", naming.prefix, id, first_page);
    if naming.extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, naming.extension)
    }
}

/// Build the OCR work list. Ids are 1-based and follow input order, so the
/// same block sequence always yields the same ids and names.
pub fn materialize_tasks(blocks: &[ValidatedBlock], naming: &TaskNaming) -> Vec<Task> {
    blocks
        .iter()
        .enumerate()
        .map(|(index, block)| {
            let id = index + 1;
            Task {
                id,
                pages: block.pages.clone(),
                screenshots: block.screenshots.clone(),
                estimated_lines: block.line_count,
                has_description: block.has_description,
                output_file: output_name(id, block.first_page(), naming),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidatorConfig;
    use crate::types::{MergedBlock, RawBlock};
    use crate::validator::validate_blocks;

    fn validated(pages: &[(usize, bool)]) -> Vec<ValidatedBlock> {
        let blocks: Vec<MergedBlock> = pages
            .iter()
            .map(|&(page, described)| {
                let description = if described { "explains" } else { "" };
                let mut raw = RawBlock::from_text(
                    page,
                    vec!["x = 1".to_string(), "y = 2".to_string()],
                    description.to_string(),
                    false,
                );
                raw.screenshot = Some(format!("page_{:03}.png", page));
                MergedBlock::from(raw)
            })
            .collect();
        validate_blocks(blocks, &ValidatorConfig::default()).accepted
    }

    #[test]
    fn test_output_name_format() {
        let naming = TaskNaming::default();
        assert_eq!(output_name(1, 27, &naming), "code_001_p27.py");
        assert_eq!(output_name(12, 143, &naming), "code_012_p143.py");
        assert_eq!(output_name(1234, 5, &naming), "code_1234_p5.py");
    }

    #[test]
    fn test_output_name_without_extension() {
        let naming = TaskNaming {
            prefix: "listing".to_string(),
            extension: String::new(),
        };
        assert_eq!(output_name(3, 9, &naming), "listing_003_p9");
    }

    #[test]
    fn test_ids_follow_input_order() {
        let tasks = materialize_tasks(&validated(&[(10, true), (13, false), (19, false)]), &TaskNaming::default());
        let ids: Vec<usize> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(tasks[1].output_file, "code_002_p13.py");
        assert_eq!(tasks[0].screenshots, vec!["page_010.png"]);
        assert_eq!(tasks[0].estimated_lines, 2);
        assert!(tasks[0].has_description);
        assert!(!tasks[1].has_description);
    }

    #[test]
    fn test_materialize_is_repeatable() {
        let blocks = validated(&[(4, false), (8, true)]);
        let naming = TaskNaming::default();
        assert_eq!(materialize_tasks(&blocks, &naming), materialize_tasks(&blocks, &naming));
    }

    #[test]
    fn test_empty_input_gives_empty_list() {
        assert!(materialize_tasks(&[], &TaskNaming::default()).is_empty());
    }
}
