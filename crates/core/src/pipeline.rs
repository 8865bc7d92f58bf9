//! Sequential detection pipeline and the collaborator seams it runs against.
//!
//! Pages are scanned strictly in increasing order. Each page goes through the
//! classifier; candidate pages are segmented from text and, when a renderer is
//! available, searched for shaded regions. All raw blocks then flow through
//! the merger, the validator and the task materializer.
//!
//! A collaborator failure only affects its own page: the page becomes a
//! [`PageGap`] and contributes no block, which also keeps it from bridging a
//! merge between its neighbours.

use image::DynamicImage;
use log::{debug, warn};
use thiserror::Error;

use crate::classifier::is_candidate_page;
use crate::config::{DetectionConfig, LocatorPreset};
use crate::dedup::{dedup_regions, reconcile_page};
use crate::merger::{merge_blocks, sort_for_merge};
use crate::normalize::clean_ocr_text;
use crate::regions::{count_numeric_lines, crop, left_strip, locate_regions, reaches_page_bottom};
use crate::report::{build_report, Report};
use crate::segmenter::segment_page;
use crate::tasks::materialize_tasks;
use crate::types::{
    DetectionSource, LocatedRegion, Page, PageGap, PageNumber, RawBlock, Region, Task,
    ValidatedBlock,
};
use crate::validator::validate_blocks;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Page {page} unavailable: {reason}")]
    PageUnavailable { page: PageNumber, reason: String },
    #[error("No text for page {page}: {reason}")]
    TextUnavailable { page: PageNumber, reason: String },
    #[error("OCR failed: {0}")]
    OcrFailed(String),
    #[error("Cannot decode bitmap: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// A rendered page.
#[derive(Debug, Clone)]
pub struct Bitmap {
    /// Where the bitmap was persisted, if anywhere. Used as the screenshot
    /// reference of the blocks found on the page.
    pub reference: Option<String>,
    pub image: DynamicImage,
}

pub trait TextExtractor {
    /// Raw UTF-8 text of a page. An empty string is a valid answer for
    /// image-only pages.
    fn extract_text(&self, page: PageNumber) -> Result<String, CollaboratorError>;
}

pub trait Renderer {
    /// Deterministic for a given resolution. Failing means the page is
    /// unavailable, never a blank bitmap.
    fn render(&self, page: PageNumber, resolution: u32) -> Result<Bitmap, CollaboratorError>;
}

pub trait OcrEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// What happened to one page, reported to the progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The classifier did not select the page.
    Skipped,
    Scanned { blocks: usize, regions: usize },
    Gap(String),
}

/// Everything one run produced.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub pages_scanned: usize,
    pub candidates: usize,
    pub blocks: Vec<ValidatedBlock>,
    pub tasks: Vec<Task>,
    pub gaps: Vec<PageGap>,
    pub rejected: usize,
    pub regions: Vec<LocatedRegion>,
}

impl ScanOutput {
    /// Share of scanned pages that became gaps.
    pub fn gap_ratio(&self) -> f64 {
        if self.pages_scanned == 0 {
            0.0
        } else {
            self.gaps.len() as f64 / self.pages_scanned as f64
        }
    }

    pub fn report(&self, total_pages: usize) -> Report {
        build_report(total_pages, &self.blocks, self.rejected, &self.gaps)
    }
}

/// Result of scanning one page.
#[derive(Debug, Clone, Default)]
struct PageScan {
    candidate: bool,
    blocks: Vec<RawBlock>,
    regions: Vec<LocatedRegion>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    config: &'a DetectionConfig,
    text: &'a dyn TextExtractor,
    renderer: Option<&'a dyn Renderer>,
    ocr: Option<&'a dyn OcrEngine>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a DetectionConfig, text: &'a dyn TextExtractor) -> Self {
        Pipeline {
            config,
            text,
            renderer: None,
            ocr: None,
        }
    }

    /// Enable image-region detection.
    pub fn with_renderer(mut self, renderer: &'a dyn Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Enable recognition of image regions and line-number corroboration.
    pub fn with_ocr(mut self, ocr: &'a dyn OcrEngine) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn run(&self, pages: impl IntoIterator<Item = PageNumber>) -> ScanOutput {
        self.run_with_progress(pages, |_, _| {})
    }

    /// Run over `pages`, calling `progress` once per page after it is scanned.
    pub fn run_with_progress<F>(
        &self,
        pages: impl IntoIterator<Item = PageNumber>,
        mut progress: F,
    ) -> ScanOutput
    where
        F: FnMut(PageNumber, &PageOutcome),
    {
        let mut pages: Vec<PageNumber> = pages.into_iter().collect();
        pages.sort_unstable();
        pages.dedup();

        let mut output = ScanOutput {
            pages_scanned: pages.len(),
            ..ScanOutput::default()
        };
        let mut raw_blocks = Vec::new();

        for page in pages {
            let outcome = match self.scan_page(page) {
                Ok(scan) if !scan.candidate => PageOutcome::Skipped,
                Ok(scan) => {
                    output.candidates += 1;
                    let outcome = PageOutcome::Scanned {
                        blocks: scan.blocks.len(),
                        regions: scan.regions.len(),
                    };
                    raw_blocks.extend(scan.blocks);
                    output.regions.extend(scan.regions);
                    outcome
                }
                Err(e) => {
                    warn!("page {} skipped: {}", page, e);
                    output.gaps.push(PageGap {
                        page,
                        reason: e.to_string(),
                    });
                    PageOutcome::Gap(e.to_string())
                }
            };
            progress(page, &outcome);
        }

        sort_for_merge(&mut raw_blocks);
        let merged = merge_blocks(raw_blocks, &self.config.merger);
        let validation = validate_blocks(merged, &self.config.validator);

        output.tasks = materialize_tasks(&validation.accepted, &self.config.tasks);
        output.blocks = validation.accepted;
        output.rejected = validation.rejected;
        output
    }

    fn scan_page(&self, number: PageNumber) -> Result<PageScan, CollaboratorError> {
        let page = Page {
            number,
            text: self.text.extract_text(number)?,
            bitmap: None,
        };
        if !is_candidate_page(&page.text, &self.config.classifier) {
            debug!("page {}: not a candidate", number);
            return Ok(PageScan::default());
        }

        let text_block = segment_page(
            number,
            &page.text,
            &self.config.classifier.description_markers,
            &self.config.segmenter,
        );
        debug!(
            "page {}: candidate, text block {}",
            number,
            if text_block.is_some() { "found" } else { "absent" }
        );

        let Some(renderer) = self.renderer else {
            return Ok(PageScan {
                candidate: true,
                blocks: text_block.into_iter().collect(),
                regions: Vec::new(),
            });
        };

        let rendered = renderer.render(number, self.config.render.resolution)?;
        let page = Page {
            bitmap: rendered.reference.clone(),
            ..page
        };
        let preset = self.config.locator.active();
        let located = dedup_regions(
            locate_regions(&rendered.image, preset),
            self.config.locator.overlap_ratio,
        );

        let mut regions = Vec::with_capacity(located.len());
        for region in located {
            if self.confirms_line_numbers(&rendered.image, &region, preset)? {
                regions.push(region);
            } else {
                debug!("page {}: region {} has no line numbers", number, region);
            }
        }

        let mut blocks: Vec<RawBlock> = text_block
            .into_iter()
            .map(|block| RawBlock {
                screenshot: page.bitmap.clone(),
                ..block
            })
            .collect();
        if let Some(ocr) = self.ocr {
            for region in &regions {
                if let Some(block) = self.recognize_region(&page, &rendered.image, region, ocr)? {
                    blocks.push(block);
                }
            }
        }

        let located = regions
            .iter()
            .enumerate()
            .map(|(index, region)| LocatedRegion {
                page: number,
                rank: index + 1,
                region: *region,
                screenshot: page.bitmap.clone(),
            })
            .collect();

        Ok(PageScan {
            candidate: true,
            blocks: reconcile_page(blocks, &regions),
            regions: located,
        })
    }

    /// Left-strip check for presets that ask for it. Without an OCR engine the
    /// check cannot run and the region is kept.
    fn confirms_line_numbers(
        &self,
        image: &DynamicImage,
        region: &Region,
        preset: &LocatorPreset,
    ) -> Result<bool, CollaboratorError> {
        let (true, Some(ocr)) = (preset.require_line_numbers, self.ocr) else {
            return Ok(true);
        };
        let strip = crop(image, &left_strip(region, preset.strip_max_width));
        let text = ocr.recognize(&strip)?;
        Ok(count_numeric_lines(&text) >= preset.min_numeric_tokens)
    }

    fn recognize_region(
        &self,
        page: &Page,
        image: &DynamicImage,
        region: &Region,
        ocr: &dyn OcrEngine,
    ) -> Result<Option<RawBlock>, CollaboratorError> {
        let text = ocr.recognize(&crop(image, region))?;
        let (lines, description) =
            clean_ocr_text(&text, &self.config.classifier.description_markers);
        if lines.is_empty() {
            return Ok(None);
        }

        let continued = reaches_page_bottom(
            region,
            image.height(),
            self.config.locator.continuation_band,
        );
        Ok(Some(RawBlock {
            page: page.number,
            lines,
            description,
            continued,
            region: Some(*region),
            screenshot: page.bitmap.clone(),
            source: DetectionSource::ImageRegion,
        }))
    }
}
