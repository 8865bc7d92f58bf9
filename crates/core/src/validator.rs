//! Block validator: drops blocks without any genuine code.

use log::debug;

use crate::config::ValidatorConfig;
use crate::normalize::strip_line_number;
use crate::types::{MergedBlock, ValidatedBlock};

/// A line counts as code when, with any numbering removed, it is non-empty
/// and does not start with the comment marker.
pub fn is_code_line(line: &str, comment_marker: &str) -> bool {
    let code = strip_line_number(line).trim_start();
    !code.is_empty() && (comment_marker.is_empty() || !code.starts_with(comment_marker))
}

/// Accept iff at least one line is code.
pub fn is_valid_block(block: &MergedBlock, config: &ValidatorConfig) -> bool {
    block
        .lines
        .iter()
        .any(|line| is_code_line(line, &config.comment_marker))
}

/// Outcome of validating a sequence of blocks.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub accepted: Vec<ValidatedBlock>,
    pub rejected: usize,
}

/// Keep the blocks that pass [`is_valid_block`], in input order, counting the
/// rejected ones for diagnostics.
pub fn validate_blocks(blocks: Vec<MergedBlock>, config: &ValidatorConfig) -> Validation {
    let mut validation = Validation::default();
    for block in blocks {
        if is_valid_block(&block, config) {
            validation.accepted.push(ValidatedBlock::new(block));
        } else {
            debug!("rejecting block on pages {:?}: no code lines", block.pages);
            validation.rejected += 1;
        }
    }
    validation
}
