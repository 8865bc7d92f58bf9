use std::path::{Path, PathBuf};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use listings_core::pipeline::{OcrEngine, PageOutcome, Pipeline, Renderer, ScanOutput, TextExtractor};
use listings_core::report::total_estimated_lines;
use listings_core::types::PageNumber;
use pdf::PdfDocument;

use crate::adapters::{
    CachedRenderer, CommandOcr, DirRenderer, OcrFallbackText, PdfTextExtractor, ScanRenderer,
};
use crate::artifacts::{write_artifacts, write_region_crops, Written};
use crate::prelude::{eprintln, println, *};
use crate::settings::{self, Preset};

#[derive(Debug, clap::Args)]
#[command(name = "scan")]
pub struct App {
    /// Path to the book PDF
    pdf: PathBuf,

    /// Directory for blocks.json, ocr_tasks.json and the report
    #[arg(short, long, env = "LISTINGS_OUT_DIR", default_value = "listings-out")]
    out_dir: PathBuf,

    /// Read pre-rendered `page_NNN.png` files instead of the PDF's scans
    #[arg(long, env = "LISTINGS_PAGES_DIR", conflicts_with = "no_images")]
    pages_dir: Option<PathBuf>,

    /// Text layer only; skip rendering and region location
    #[arg(long)]
    no_images: bool,

    /// OCR command; `{input}` is replaced by the image path
    /// (e.g. "tesseract {input} stdout --psm 6")
    #[arg(long, env = "LISTINGS_OCR_CMD")]
    ocr_cmd: Option<String>,

    /// Region locator preset (overrides the config file)
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Rendering resolution in DPI (overrides the config file)
    #[arg(long)]
    resolution: Option<u32>,

    /// First page to scan (1-based)
    #[arg(long)]
    first: Option<PageNumber>,

    /// Last page to scan (inclusive)
    #[arg(long)]
    last: Option<PageNumber>,

    /// Write a crop of every located region next to the screenshots
    #[arg(long)]
    debug_regions: bool,

    /// Fail when more than this share of the scanned pages could not be read
    #[arg(long, env = "LISTINGS_MAX_GAP_RATIO", default_value = "1.0")]
    max_gap_ratio: f64,

    /// Print the task list as JSON to stdout
    #[arg(long)]
    json: bool,
}

pub fn run(app: App, global: crate::Global) -> Result<()> {
    let mut config = settings::load(global.config.as_deref())?;
    if let Some(preset) = app.preset {
        config.locator.preset = preset.into();
    }
    if let Some(resolution) = app.resolution {
        config.render.resolution = resolution;
    }
    config.validate()?;

    let doc = PdfDocument::open(&app.pdf)
        .wrap_err_with(|| f!("Cannot open {}", app.pdf.display()))?;
    let total_pages = doc.page_count();
    let pages = select_pages(&doc.page_numbers(), app.first, app.last)?;
    log::info!(
        "{}: {} pages, scanning {}",
        app.pdf.display(),
        total_pages,
        pages.len()
    );

    let screenshots = app.out_dir.join("screenshots");
    let base_renderer: Option<Box<dyn Renderer + '_>> = if app.no_images {
        None
    } else if let Some(dir) = &app.pages_dir {
        Some(Box::new(DirRenderer::new(dir)))
    } else {
        std::fs::create_dir_all(&screenshots)
            .wrap_err_with(|| f!("Cannot create {}", screenshots.display()))?;
        Some(Box::new(ScanRenderer::new(&doc, Some(screenshots.clone()))))
    };
    let renderer = base_renderer.as_deref().map(CachedRenderer::new);
    let ocr = app.ocr_cmd.as_deref().map(CommandOcr::parse).transpose()?;

    let pdf_text = PdfTextExtractor::new(&doc);
    let fallback = match (renderer.as_ref(), ocr.as_ref()) {
        (Some(renderer), Some(ocr)) => Some(OcrFallbackText::new(
            &pdf_text,
            renderer,
            ocr,
            config.render.resolution,
        )),
        _ => None,
    };
    let text: &dyn TextExtractor = match &fallback {
        Some(fallback) => fallback,
        None => &pdf_text,
    };

    let mut pipeline = Pipeline::new(&config, text);
    if let Some(renderer) = renderer.as_ref() {
        pipeline = pipeline.with_renderer(renderer);
    }
    if let Some(ocr) = ocr.as_ref() {
        pipeline = pipeline.with_ocr(ocr as &dyn OcrEngine);
    }

    let progress = if global.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(pages.len() as u64)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let output = pipeline.run_with_progress(pages, |page, outcome| {
        progress.set_message(f!("page {}", page));
        if let PageOutcome::Gap(reason) = outcome {
            progress.println(f!("{} page {}: {}", "gap".yellow(), page, reason));
        }
        progress.inc(1);
    });
    progress.finish_and_clear();

    if !global.quiet {
        print_summary(&output);
    }

    let written = persist(&app.out_dir, &output, total_pages, app.max_gap_ratio)?;
    if app.debug_regions {
        let crops = write_region_crops(&screenshots, &output.regions)?;
        log::info!("wrote {} region crops to {}", crops, screenshots.display());
    }

    if app.json {
        println!("{}", serde_json::to_string_pretty(&output.tasks)?);
    }
    if !global.quiet {
        eprintln!("Tasks written to {}", written.tasks.display().to_string().cyan());
    }
    Ok(())
}

/// Write the run's artifacts, unless too many pages failed. A rejected run
/// leaves the previous output in place.
fn persist(
    out_dir: &Path,
    output: &ScanOutput,
    total_pages: usize,
    max_gap_ratio: f64,
) -> Result<Written> {
    check_gap_ratio(output, max_gap_ratio)?;
    write_artifacts(out_dir, output, total_pages)
}

/// Pages of the document within `first..=last`.
fn select_pages(
    all: &[PageNumber],
    first: Option<PageNumber>,
    last: Option<PageNumber>,
) -> Result<Vec<PageNumber>, Error> {
    if let (Some(first), Some(last)) = (first, last) {
        if first > last {
            return Err(Error::InvalidPageRange { first, last });
        }
    }
    Ok(all
        .iter()
        .copied()
        .filter(|page| first.map_or(true, |first| *page >= first))
        .filter(|page| last.map_or(true, |last| *page <= last))
        .collect())
}

fn check_gap_ratio(output: &ScanOutput, max: f64) -> Result<()> {
    let ratio = output.gap_ratio();
    if ratio > max {
        return Err(Error::TooManyGaps {
            gaps: output.gaps.len(),
            pages: output.pages_scanned,
            ratio,
            max,
        }
        .into());
    }
    Ok(())
}

fn print_summary(output: &ScanOutput) {
    eprintln!("\n{}", "== Scan ==".bold().cyan());
    eprintln!("Pages scanned:    {}", output.pages_scanned);
    eprintln!("Candidate pages:  {}", output.candidates);
    eprintln!("Regions located:  {}", output.regions.len());
    eprintln!("Code blocks:      {}", output.blocks.len().to_string().green());
    eprintln!(
        "Cross-page:       {}",
        output.blocks.iter().filter(|b| b.is_merged).count()
    );
    eprintln!("Rejected:         {}", output.rejected);
    eprintln!("Estimated lines:  {}", total_estimated_lines(&output.tasks));
    if !output.gaps.is_empty() {
        eprintln!(
            "Gaps:             {}",
            output.gaps.len().to_string().yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use listings_core::types::PageGap;

    #[test]
    fn test_select_all_pages() {
        let all = vec![1, 2, 3, 4];
        assert_eq!(select_pages(&all, None, None).unwrap(), all);
    }

    #[test]
    fn test_select_page_range() {
        let all: Vec<PageNumber> = (1..=10).collect();
        assert_eq!(select_pages(&all, Some(3), Some(5)).unwrap(), vec![3, 4, 5]);
        assert_eq!(select_pages(&all, Some(9), None).unwrap(), vec![9, 10]);
        assert_eq!(select_pages(&all, None, Some(2)).unwrap(), vec![1, 2]);
        assert!(select_pages(&all, Some(11), None).unwrap().is_empty());
    }

    #[test]
    fn test_select_inverted_range() {
        assert!(matches!(
            select_pages(&[1, 2, 3], Some(3), Some(1)),
            Err(Error::InvalidPageRange { first: 3, last: 1 })
        ));
    }

    #[test]
    fn test_rejected_run_keeps_previous_artifacts() {
        let dir = tempfile::TempDir::new().unwrap();
        let tasks = dir.path().join(crate::artifacts::TASKS_FILE);
        std::fs::write(&tasks, "previous").unwrap();

        let output = ScanOutput {
            pages_scanned: 2,
            gaps: vec![
                PageGap {
                    page: 1,
                    reason: "Page 1 unavailable".into(),
                },
                PageGap {
                    page: 2,
                    reason: "Page 2 unavailable".into(),
                },
            ],
            ..ScanOutput::default()
        };
        assert!(persist(dir.path(), &output, 2, 0.5).is_err());
        assert_eq!(std::fs::read_to_string(&tasks).unwrap(), "previous");
        assert!(!dir.path().join(crate::artifacts::BLOCKS_FILE).exists());

        persist(dir.path(), &output, 2, 1.0).unwrap();
        assert_eq!(std::fs::read_to_string(&tasks).unwrap().trim(), "[]");
    }

    #[test]
    fn test_gap_ratio_threshold() {
        let output = ScanOutput {
            pages_scanned: 4,
            gaps: vec![PageGap {
                page: 2,
                reason: "Page 2 unavailable".into(),
            }],
            ..ScanOutput::default()
        };
        assert!(check_gap_ratio(&output, 1.0).is_ok());
        assert!(check_gap_ratio(&output, 0.25).is_ok());
        let err = check_gap_ratio(&output, 0.2).unwrap_err();
        assert!(err.to_string().contains("1 of 4 pages failed"));
    }
}
