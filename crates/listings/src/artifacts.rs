//! Run artifacts: the JSON files consumed by the OCR stage and the region
//! debug crops.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use listings_core::pipeline::ScanOutput;
use listings_core::regions::crop;
use listings_core::types::{LocatedRegion, PageNumber};
use serde::Serialize;

use crate::prelude::*;

pub const BLOCKS_FILE: &str = "blocks.json";
pub const TASKS_FILE: &str = "ocr_tasks.json";
pub const REPORT_FILE: &str = "code_analysis_report.json";

/// Where a run wrote its artifacts.
#[derive(Debug, Clone)]
pub struct Written {
    pub blocks: PathBuf,
    pub tasks: PathBuf,
    pub report: PathBuf,
}

/// Pretty-print `value` to `path`, replacing any previous file.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).wrap_err_with(|| f!("Cannot write {}", path.display()))
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let source =
        std::fs::read_to_string(path).wrap_err_with(|| f!("Cannot read {}", path.display()))?;
    serde_json::from_str(&source).wrap_err_with(|| f!("Malformed JSON in {}", path.display()))
}

/// Write blocks, tasks and the report of one run into `out_dir`.
pub fn write_artifacts(out_dir: &Path, output: &ScanOutput, total_pages: usize) -> Result<Written> {
    std::fs::create_dir_all(out_dir)
        .wrap_err_with(|| f!("Cannot create output directory {}", out_dir.display()))?;

    let written = Written {
        blocks: out_dir.join(BLOCKS_FILE),
        tasks: out_dir.join(TASKS_FILE),
        report: out_dir.join(REPORT_FILE),
    };
    write_json(&written.blocks, &output.blocks)?;
    write_json(&written.tasks, &output.tasks)?;
    write_json(&written.report, &output.report(total_pages))?;
    Ok(written)
}

/// `page_NNN_region_R.png`, R being the region's rank on its page.
pub fn crop_file_name(page: PageNumber, rank: usize) -> String {
    f!("page_{:03}_region_{}.png", page, rank)
}

/// Save a crop of every located region whose page screenshot was persisted.
/// Returns the number of crops written.
pub fn write_region_crops(dir: &Path, regions: &[LocatedRegion]) -> Result<usize> {
    let mut by_screenshot: BTreeMap<&str, Vec<&LocatedRegion>> = BTreeMap::new();
    for located in regions {
        if let Some(screenshot) = located.screenshot.as_deref() {
            by_screenshot.entry(screenshot).or_default().push(located);
        }
    }
    if by_screenshot.is_empty() {
        return Ok(0);
    }

    std::fs::create_dir_all(dir)
        .wrap_err_with(|| f!("Cannot create directory {}", dir.display()))?;

    let mut written = 0;
    for (screenshot, located) in by_screenshot {
        let image = image::open(screenshot).wrap_err_with(|| f!("Cannot open {}", screenshot))?;
        for region in located {
            let path = dir.join(crop_file_name(region.page, region.rank));
            crop(&image, &region.region)
                .save(&path)
                .wrap_err_with(|| f!("Cannot write {}", path.display()))?;
            written += 1;
        }
    }
    Ok(written)
}
