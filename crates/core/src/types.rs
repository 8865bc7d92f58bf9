use std::fmt;

use serde::{Deserialize, Serialize};

/// 1-based page ordinal within the source document.
pub type PageNumber = usize;

/// A single page as handed over by the text and rendering collaborators.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: PageNumber,
    pub text: String,
    /// Reference (usually a file path) to the rendered bitmap, when one exists.
    pub bitmap: Option<String>,
}

/// Axis-aligned bounding box in bitmap pixel coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Region {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// Area shared with `other`, zero when the boxes do not touch.
    pub fn intersection_area(&self, other: &Region) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) as u64 * (bottom - top) as u64
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Which detector produced a [`RawBlock`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Numbered lines found in the page's text layer.
    LineNumbers,
    /// Shaded background region found in the page bitmap.
    ImageRegion,
}

/// A code block detected on exactly one page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub page: PageNumber,
    /// Code lines in page order with their line-number markers removed.
    pub lines: Vec<String>,
    pub description: String,
    /// The block looks truncated by the bottom of its page.
    pub continued: bool,
    pub region: Option<Region>,
    pub screenshot: Option<String>,
    pub source: DetectionSource,
}

impl RawBlock {
    /// A text-layer block with no region or screenshot attached yet.
    pub fn from_text(
        page: PageNumber,
        lines: Vec<String>,
        description: String,
        continued: bool,
    ) -> Self {
        RawBlock {
            page,
            lines,
            description,
            continued,
            region: None,
            screenshot: None,
            source: DetectionSource::LineNumbers,
        }
    }

    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

/// One or more [`RawBlock`]s from contiguous pages, joined by the merger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MergedBlock {
    /// First contributing page.
    pub page: PageNumber,
    /// Contributing pages, contiguous and strictly increasing.
    pub pages: Vec<PageNumber>,
    pub lines: Vec<String>,
    pub description: String,
    /// Continuation flag of the last contributing block.
    pub continued: bool,
    /// Region of the first contributing block.
    pub region: Option<Region>,
    pub screenshots: Vec<String>,
    pub line_count: usize,
    pub has_description: bool,
    pub is_merged: bool,
}

impl MergedBlock {
    pub fn first_page(&self) -> PageNumber {
        self.page
    }

    pub fn last_page(&self) -> PageNumber {
        self.pages.last().copied().unwrap_or(self.page)
    }

    /// Append the contents of the block found on the following page.
    pub(crate) fn absorb(&mut self, next: RawBlock) {
        self.pages.push(next.page);
        self.line_count += next.lines.len();
        self.lines.extend(next.lines);
        if !next.description.trim().is_empty() {
            if !self.description.is_empty() {
                self.description.push('\n');
            }
            self.description.push_str(&next.description);
        }
        if let Some(shot) = next.screenshot {
            if !self.screenshots.contains(&shot) {
                self.screenshots.push(shot);
            }
        }
        self.continued = next.continued;
        self.has_description = !self.description.trim().is_empty();
        self.is_merged = true;
    }

    /// View this block as a single-page block again, as used when re-running
    /// the merger over its own output.
    pub fn as_raw(&self) -> RawBlock {
        RawBlock {
            page: self.page,
            lines: self.lines.clone(),
            description: self.description.clone(),
            continued: self.continued,
            region: self.region,
            screenshot: self.screenshots.first().cloned(),
            source: DetectionSource::LineNumbers,
        }
    }
}

impl From<RawBlock> for MergedBlock {
    fn from(block: RawBlock) -> Self {
        let has_description = block.has_description();
        MergedBlock {
            page: block.page,
            pages: vec![block.page],
            line_count: block.lines.len(),
            lines: block.lines,
            description: block.description,
            continued: block.continued,
            region: block.region,
            screenshots: block.screenshot.into_iter().collect(),
            has_description,
            is_merged: false,
        }
    }
}

/// A [`MergedBlock`] that passed validation.
///
/// Carries no extra data; the wrapper only records that the check happened.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct ValidatedBlock(MergedBlock);

impl ValidatedBlock {
    pub(crate) fn new(block: MergedBlock) -> Self {
        ValidatedBlock(block)
    }
}

impl std::ops::Deref for ValidatedBlock {
    type Target = MergedBlock;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A uniquely named unit of OCR work describing one validated block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: usize,
    pub pages: Vec<PageNumber>,
    pub screenshots: Vec<String>,
    pub estimated_lines: usize,
    pub has_description: bool,
    pub output_file: String,
}

/// A page whose collaborators failed. Kept explicit so that page adjacency
/// stays correct for the merger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageGap {
    pub page: PageNumber,
    pub reason: String,
}

/// A region located on a page, ranked by area (1 = largest).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LocatedRegion {
    pub page: PageNumber,
    pub rank: usize,
    pub region: Region,
    pub screenshot: Option<String>,
}
