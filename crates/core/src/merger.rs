//! Cross-page merger.
//!
//! A single forward pass over blocks in page order. A block flagged as
//! continued absorbs the next block when that block sits on the following
//! page. How many pages one merged block may span is capped by
//! [`MergerConfig::max_chain_length`]; at the default of 2 a block that is
//! the product of a merge never merges again, so in a 5 -> 6 -> 7 chain page
//! 7 stays on its own.

use log::debug;

use crate::config::MergerConfig;
use crate::types::{MergedBlock, RawBlock};

/// Reduce page-ordered raw blocks into merged blocks.
///
/// Adjacency is page-number succession: a gap page (no block, or a failed
/// page) between two blocks prevents the merge. A continued block without a
/// qualifying successor is emitted unmerged.
pub fn merge_blocks(blocks: Vec<RawBlock>, config: &MergerConfig) -> Vec<MergedBlock> {
    let mut merged: Vec<MergedBlock> = Vec::with_capacity(blocks.len());
    let mut queue = blocks.into_iter().peekable();

    while let Some(block) = queue.next() {
        let mut current = MergedBlock::from(block);

        while current.continued && current.pages.len() < config.max_chain_length {
            let next_page = current.last_page() + 1;
            let Some(next) = queue.next_if(|next| next.page == next_page) else {
                break;
            };
            debug!("merging page {} into block from page {}", next.page, current.page);
            current.absorb(next);
        }

        merged.push(current);
    }

    merged
}

/// Order blocks for the merger. Stable, so blocks found on the same page keep
/// their detection order.
pub fn sort_for_merge(blocks: &mut [RawBlock]) {
    blocks.sort_by_key(|block| block.page);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(page: usize, line: &str, continued: bool) -> RawBlock {
        let mut block = RawBlock::from_text(page, vec![line.to_string()], String::new(), continued);
        block.screenshot = Some(format!("page_{:03}.png", page));
        block
    }

    fn single_hop() -> MergerConfig {
        MergerConfig::default()
    }

    #[test]
    fn test_continued_block_merges_with_next_page() {
        let blocks = vec![raw(5, "a = 1", true), raw(6, "b = 2", false)];
        let merged = merge_blocks(blocks, &single_hop());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pages, vec![5, 6]);
        assert_eq!(merged[0].lines, vec!["a = 1", "b = 2"]);
        assert_eq!(merged[0].screenshots, vec!["page_005.png", "page_006.png"]);
        assert_eq!(merged[0].line_count, 2);
        assert!(merged[0].is_merged);
    }

    #[test]
    fn test_non_adjacent_successor_not_merged() {
        let blocks = vec![raw(5, "a = 1", true), raw(7, "b = 2", false)];
        let merged = merge_blocks(blocks, &single_hop());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].pages, vec![5]);
        assert!(!merged[0].is_merged);
        assert_eq!(merged[1].pages, vec![7]);
    }

    #[test]
    fn test_continued_last_block_emitted_unmerged() {
        let merged = merge_blocks(vec![raw(9, "x", true)], &single_hop());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pages, vec![9]);
        assert!(merged[0].continued);
    }

    #[test]
    fn test_not_continued_blocks_pass_through() {
        let blocks = vec![raw(1, "a", false), raw(2, "b", false), raw(3, "c", false)];
        let merged = merge_blocks(blocks, &single_hop());
        let pages: Vec<Vec<usize>> = merged.iter().map(|b| b.pages.clone()).collect();
        assert_eq!(pages, vec![vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn test_three_page_chain_merges_single_hop() {
        let blocks = vec![raw(5, "a", true), raw(6, "b", true), raw(7, "c", true)];
        let merged = merge_blocks(blocks, &single_hop());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].pages, vec![5, 6]);
        assert_eq!(merged[1].pages, vec![7]);
        assert!(!merged[1].is_merged);
    }

    #[test]
    fn test_longer_chain_when_configured() {
        let blocks = vec![
            raw(5, "a", true),
            raw(6, "b", true),
            raw(7, "c", true),
            raw(8, "d", false),
        ];
        let config = MergerConfig {
            max_chain_length: 3,
        };
        let merged = merge_blocks(blocks, &config);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].pages, vec![5, 6, 7]);
        assert_eq!(merged[0].lines, vec!["a", "b", "c"]);
        assert_eq!(merged[1].pages, vec![8]);
    }

    #[test]
    fn test_chain_length_one_disables_merging() {
        let blocks = vec![raw(5, "a", true), raw(6, "b", false)];
        let config = MergerConfig {
            max_chain_length: 1,
        };
        assert_eq!(merge_blocks(blocks, &config).len(), 2);
    }

    #[test]
    fn test_same_page_successor_not_merged() {
        let blocks = vec![raw(5, "a", true), raw(5, "b", true), raw(6, "c", false)];
        let merged = merge_blocks(blocks, &single_hop());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].pages, vec![5]);
        assert_eq!(merged[1].pages, vec![5, 6]);
    }

    #[test]
    fn test_merging_own_output_is_idempotent() {
        let blocks = vec![
            raw(2, "a", false),
            raw(5, "b", true),
            raw(6, "c", true),
            raw(7, "d", true),
            raw(8, "e", false),
        ];
        let first = merge_blocks(blocks, &single_hop());
        let again: Vec<RawBlock> = first
            .iter()
            .map(|block| {
                let mut raw = block.as_raw();
                raw.continued = false;
                raw
            })
            .collect();
        let second = merge_blocks(again, &single_hop());
        assert_eq!(second.len(), first.len());
        assert!(second.iter().all(|block| !block.is_merged));
    }

    #[test]
    fn test_merged_pages_are_contiguous() {
        let blocks = vec![
            raw(1, "a", true),
            raw(2, "b", true),
            raw(4, "c", true),
            raw(5, "d", true),
            raw(6, "e", true),
        ];
        let config = MergerConfig {
            max_chain_length: 10,
        };
        for block in merge_blocks(blocks, &config) {
            assert!(block.pages.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }

    #[test]
    fn test_sort_for_merge_is_stable() {
        let mut blocks = vec![raw(3, "c", false), raw(1, "a1", false), raw(1, "a2", false)];
        sort_for_merge(&mut blocks);
        let lines: Vec<&str> = blocks.iter().map(|b| b.lines[0].as_str()).collect();
        assert_eq!(lines, vec!["a1", "a2", "c"]);
    }
}
