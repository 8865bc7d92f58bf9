//! Collaborators the core pipeline talks to, backed by the PDF, the
//! filesystem and an external OCR command.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::imageops::FilterType;
use image::DynamicImage;
use listings_core::pipeline::{Bitmap, CollaboratorError, OcrEngine, Renderer, TextExtractor};
use listings_core::types::PageNumber;
use log::debug;
use pdf::{PdfDocument, PdfError};

use crate::prelude::*;

/// File name of a rendered page, shared by renderers and debug crops.
pub fn page_file_name(page: PageNumber) -> String {
    f!("page_{:03}.png", page)
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Text layer of the PDF.
pub struct PdfTextExtractor<'a> {
    doc: &'a PdfDocument,
}

impl<'a> PdfTextExtractor<'a> {
    pub fn new(doc: &'a PdfDocument) -> Self {
        PdfTextExtractor { doc }
    }
}

impl TextExtractor for PdfTextExtractor<'_> {
    fn extract_text(&self, page: PageNumber) -> Result<String, CollaboratorError> {
        self.doc.page_text(page).map_err(|e| {
            let reason = e.to_string();
            match e {
                PdfError::PageNotFound(_) => CollaboratorError::PageUnavailable { page, reason },
                _ => CollaboratorError::TextUnavailable { page, reason },
            }
        })
    }
}

/// Uses OCR over the whole rendered page when the text layer is blank.
pub struct OcrFallbackText<'a> {
    inner: &'a dyn TextExtractor,
    renderer: &'a dyn Renderer,
    ocr: &'a dyn OcrEngine,
    resolution: u32,
}

impl<'a> OcrFallbackText<'a> {
    pub fn new(
        inner: &'a dyn TextExtractor,
        renderer: &'a dyn Renderer,
        ocr: &'a dyn OcrEngine,
        resolution: u32,
    ) -> Self {
        OcrFallbackText {
            inner,
            renderer,
            ocr,
            resolution,
        }
    }
}

impl TextExtractor for OcrFallbackText<'_> {
    fn extract_text(&self, page: PageNumber) -> Result<String, CollaboratorError> {
        let text = self.inner.extract_text(page)?;
        if !text.trim().is_empty() {
            return Ok(text);
        }

        debug!("page {}: empty text layer, running OCR", page);
        let bitmap = self.renderer.render(page, self.resolution)?;
        self.ocr.recognize(&bitmap.image)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Keeps the last rendered page so the OCR fallback and region detection
/// share one render per page.
pub struct CachedRenderer<'a> {
    inner: &'a dyn Renderer,
    last: RefCell<Option<(PageNumber, u32, Bitmap)>>,
}

impl<'a> CachedRenderer<'a> {
    pub fn new(inner: &'a dyn Renderer) -> Self {
        CachedRenderer {
            inner,
            last: RefCell::new(None),
        }
    }
}

impl Renderer for CachedRenderer<'_> {
    fn render(&self, page: PageNumber, resolution: u32) -> Result<Bitmap, CollaboratorError> {
        if let Some((cached, res, bitmap)) = self.last.borrow().as_ref() {
            if (*cached, *res) == (page, resolution) {
                return Ok(bitmap.clone());
            }
        }
        let bitmap = self.inner.render(page, resolution)?;
        *self.last.borrow_mut() = Some((page, resolution, bitmap.clone()));
        Ok(bitmap)
    }
}

/// Renders a page from the scan image embedded in it, scaled to the page's
/// size at the requested resolution.
pub struct ScanRenderer<'a> {
    doc: &'a PdfDocument,
    screenshots: Option<PathBuf>,
}

impl<'a> ScanRenderer<'a> {
    pub fn new(doc: &'a PdfDocument, screenshots: Option<PathBuf>) -> Self {
        ScanRenderer { doc, screenshots }
    }
}

impl Renderer for ScanRenderer<'_> {
    fn render(&self, page: PageNumber, resolution: u32) -> Result<Bitmap, CollaboratorError> {
        let unavailable = |reason: String| CollaboratorError::PageUnavailable { page, reason };

        let scan = self
            .doc
            .page_image(page)
            .map_err(|e| unavailable(e.to_string()))?;
        let size = self
            .doc
            .page_size(page)
            .map_err(|e| unavailable(e.to_string()))?;
        let (width, height) = size.pixels_at(resolution);
        let image = if (scan.width(), scan.height()) == (width, height) {
            scan
        } else {
            scan.resize_exact(width, height, FilterType::Triangle)
        };

        let reference = match &self.screenshots {
            Some(dir) => {
                let path = dir.join(page_file_name(page));
                image
                    .save(&path)
                    .map_err(|e| unavailable(f!("cannot save {}: {}", path.display(), e)))?;
                Some(path.display().to_string())
            }
            None => None,
        };

        Ok(Bitmap { reference, image })
    }
}

/// Reads pages rendered ahead of time as `page_NNN.png`. The resolution is
/// whatever they were rendered at.
pub struct DirRenderer {
    dir: PathBuf,
}

impl DirRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirRenderer { dir: dir.into() }
    }
}

impl Renderer for DirRenderer {
    fn render(&self, page: PageNumber, _resolution: u32) -> Result<Bitmap, CollaboratorError> {
        let path = self.dir.join(page_file_name(page));
        let image = image::open(&path).map_err(|e| CollaboratorError::PageUnavailable {
            page,
            reason: f!("{}: {}", path.display(), e),
        })?;
        Ok(Bitmap {
            reference: Some(path.display().to_string()),
            image,
        })
    }
}

// ---------------------------------------------------------------------------
// OCR
// ---------------------------------------------------------------------------

/// Runs an external OCR command, e.g. `tesseract {input} stdout --psm 6`.
///
/// The bitmap is written to a temporary PNG whose path replaces `{input}`
/// (or is appended when the template has no placeholder). Standard output is
/// the recognized text.
#[derive(Debug)]
pub struct CommandOcr {
    program: String,
    args: Vec<String>,
}

impl CommandOcr {
    pub fn parse(template: &str) -> Result<Self, Error> {
        let mut words = shlex::split(template)
            .ok_or_else(|| Error::OcrCommand(template.to_string()))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| Error::OcrCommand(template.to_string()))?;
        Ok(CommandOcr {
            program,
            args: words.collect(),
        })
    }

    fn args_for(&self, input: &Path) -> Vec<String> {
        let input = input.display().to_string();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace("{input}", &input))
            .collect();
        if !self.args.iter().any(|arg| arg.contains("{input}")) {
            args.push(input);
        }
        args
    }
}

impl OcrEngine for CommandOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String, CollaboratorError> {
        let failed = CollaboratorError::OcrFailed;

        let file = tempfile::Builder::new()
            .prefix("listings-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| failed(e.to_string()))?;
        image
            .save_with_format(file.path(), image::ImageFormat::Png)
            .map_err(|e| failed(e.to_string()))?;

        let output = Command::new(&self.program)
            .args(self.args_for(file.path()))
            .output()
            .map_err(|e| failed(f!("cannot run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(failed(f!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
