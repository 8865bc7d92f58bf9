use std::fmt;

use serde::{Deserialize, Serialize};

/// Encoding of an image stream as stored in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Jpeg2000,
    Unknown,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg2000 => write!(f, "jpeg2000"),
            ImageFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// The scan embedded in a page: the largest image XObject it draws.
#[derive(Debug, Clone)]
pub struct PageScan {
    /// 1-based page number.
    pub page: usize,
    /// XObject resource name, e.g. `Im0`.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    /// Encoded bytes (`format` tells which codec); raw pixel and fax streams
    /// are re-encoded as PNG.
    pub bytes: Vec<u8>,
}

/// Page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Pixel dimensions of the page rendered at `dpi`.
    pub fn pixels_at(&self, dpi: u32) -> (u32, u32) {
        let scale = dpi as f32 / 72.0;
        (
            (self.width * scale).round().max(1.0) as u32,
            (self.height * scale).round().max(1.0) as u32,
        )
    }
}
