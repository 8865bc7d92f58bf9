use std::collections::HashMap;
use std::path::{Path, PathBuf};

use colored::Colorize;
use listings_core::report::{page_label, total_estimated_lines, truncate_preview};
use listings_core::types::{MergedBlock, Task};

use crate::artifacts::{read_json, BLOCKS_FILE};
use crate::prelude::{println, *};

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, clap::Args)]
#[command(name = "summary")]
pub struct App {
    /// Task list written by `scan` (ocr_tasks.json)
    tasks: PathBuf,

    /// Blocks file for code previews; defaults to blocks.json next to the tasks
    #[arg(long)]
    blocks: Option<PathBuf>,

    /// Number of tasks to show
    #[arg(short, long, env = "LISTINGS_SUMMARY_LIMIT", default_value = "20")]
    limit: usize,
}

pub fn run(app: App, _global: crate::Global) -> Result<()> {
    let tasks: Vec<Task> = read_json(&app.tasks)?;
    let previews = load_previews(&blocks_path(&app.tasks, app.blocks.as_deref()));

    println!("{}", "== OCR Tasks ==".bold().cyan());
    let mut table = new_table();
    table.add_row(prettytable::row![
        "Id", "Pages", "Lines", "Desc", "Output", "Preview"
    ]);
    for task in tasks.iter().take(app.limit) {
        table.add_row(prettytable::row![
            f!("{:03}", task.id),
            page_label(&task.pages),
            task.estimated_lines,
            if task.has_description { "yes" } else { "" },
            task.output_file,
            previews.get(&task.id).map(String::as_str).unwrap_or("")
        ]);
    }
    table.printstd();

    if tasks.len() > app.limit {
        println!("... and {} more", tasks.len() - app.limit);
    }
    println!(
        "\n{} tasks, {} cross-page, ~{} lines",
        tasks.len(),
        tasks.iter().filter(|t| t.pages.len() > 1).count(),
        total_estimated_lines(&tasks)
    );
    Ok(())
}

fn blocks_path(tasks: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => tasks.with_file_name(BLOCKS_FILE),
    }
}

/// Task id to the first code line of its block. Task ids number the blocks
/// file in order, starting at 1.
fn load_previews(path: &Path) -> HashMap<usize, String> {
    let blocks: Vec<MergedBlock> = match read_json(path) {
        Ok(blocks) => blocks,
        Err(e) => {
            log::debug!("no previews: {}", e);
            return HashMap::new();
        }
    };
    blocks
        .iter()
        .enumerate()
        .filter_map(|(index, block)| {
            let first = block.lines.first()?;
            Some((index + 1, truncate_preview(first, PREVIEW_CHARS)))
        })
        .collect()
}
