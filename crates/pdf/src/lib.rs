//! Page-level access to book PDFs: the text layer of each page and the scan
//! image embedded in it.

use std::path::Path;

use thiserror::Error;

use parser::backend::{LopdfBackend, PageId, PdfBackend};

pub mod images;
pub mod parser;
pub mod types;

pub use types::*;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page {0} does not exist")]
    PageNotFound(usize),
    #[error("Page {0} has no embedded image")]
    NoPageImage(usize),
    #[error("Image error: {0}")]
    Image(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// A parsed PDF, queried page by page.
pub struct PdfDocument {
    backend: LopdfBackend,
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PdfError> {
        Ok(PdfDocument {
            backend: LopdfBackend::load_bytes(bytes)?,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn page_count(&self) -> usize {
        self.backend.page_count()
    }

    /// 1-based page numbers in document order.
    pub fn page_numbers(&self) -> Vec<usize> {
        self.backend.pages().keys().map(|&n| n as usize).collect()
    }

    /// Text layer of a page, one line per text baseline, top to bottom.
    /// Image-only pages yield an empty string.
    pub fn page_text(&self, page: usize) -> Result<String, PdfError> {
        parser::text::page_text(&self.backend, self.page_id(page)?)
    }

    pub fn page_size(&self, page: usize) -> Result<PageSize, PdfError> {
        self.backend.page_size(self.page_id(page)?)
    }

    /// The page's scan image as stored (JPEG, PNG or JPEG 2000 bytes).
    pub fn page_scan(&self, page: usize) -> Result<PageScan, PdfError> {
        images::page_scan(&self.backend, page, self.page_id(page)?)
    }

    /// The page's scan decoded to pixels.
    pub fn page_image(&self, page: usize) -> Result<image::DynamicImage, PdfError> {
        images::decode_scan(&self.page_scan(page)?)
    }

    fn page_id(&self, page: usize) -> Result<PageId, PdfError> {
        self.backend.page_id(page)
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fixtures::{sample_pdf, FixturePage};
    use super::*;

    #[test]
    fn test_page_text_lines_top_to_bottom() {
        let bytes = sample_pdf(&[FixturePage::text(&[
            "Example 3.1",
            "1 import rhinoscriptsyntax as rs",
            "2 pt = rs.AddPoint(0, 0, 0)",
        ])]);
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(
            doc.page_text(1).unwrap(),
            "Example 3.1\n1 import rhinoscriptsyntax as rs\n2 pt = rs.AddPoint(0, 0, 0)"
        );
    }

    #[test]
    fn test_page_numbers_and_count() {
        let bytes = sample_pdf(&[
            FixturePage::text(&["a"]),
            FixturePage::text(&["b"]),
            FixturePage::text(&["c"]),
        ]);
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page_numbers(), vec![1, 2, 3]);
        assert_eq!(doc.page_text(2).unwrap(), "b");
    }

    #[test]
    fn test_missing_page() {
        let bytes = sample_pdf(&[FixturePage::text(&["a"])]);
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert!(matches!(doc.page_text(9), Err(PdfError::PageNotFound(9))));
    }

    #[test]
    fn test_image_only_page_has_empty_text() {
        let bytes = sample_pdf(&[FixturePage::text(&[]).with_gray_image("Im0", 8, 8, 240)]);
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.page_text(1).unwrap(), "");
        let image = doc.page_image(1).unwrap();
        assert_eq!((image.width(), image.height()), (8, 8));
    }

    #[test]
    fn test_page_size() {
        let bytes = sample_pdf(&[FixturePage::text(&["a"])]);
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        let size = doc.page_size(1).unwrap();
        assert_eq!(size.pixels_at(144), (1190, 1684));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            PdfDocument::open("/nonexistent/book.pdf"),
            Err(PdfError::Io(_))
        ));
    }
}
