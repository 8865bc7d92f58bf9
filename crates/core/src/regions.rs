//! Image region locator.
//!
//! Finds shaded code-block backgrounds in a page bitmap: intensity band
//! threshold, morphological clean-up, external contours, bounding boxes,
//! size filter. Thresholds come from a [`LocatorPreset`].

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use log::debug;

use crate::config::LocatorPreset;
use crate::types::Region;

/// Mask of pixels whose intensity lies within `[low, high]` (inclusive).
pub fn band_mask(gray: &GrayImage, low: u8, high: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0];
        if (low..=high).contains(&value) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Closing (and optionally opening) with a square element of `kernel_size`
/// pixels per side. Sizes are odd; config validation rejects even ones.
pub fn clean_mask(mask: &GrayImage, kernel_size: u8, with_open: bool) -> GrayImage {
    // LInf with radius k is a (2k+1)-wide square.
    let radius = (kernel_size / 2).max(1);
    let closed = close(mask, Norm::LInf, radius);
    if with_open {
        open(&closed, Norm::LInf, radius)
    } else {
        closed
    }
}

/// Bounding box of a contour. Pixel coordinates are inclusive, so a single
/// pixel has a 1x1 box.
fn bounding_box(contour: &Contour<u32>) -> Option<Region> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some(Region::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Bounding boxes of the outermost foreground shapes in a binary mask.
pub fn external_boxes(mask: &GrayImage) -> Vec<Region> {
    find_contours::<u32>(mask)
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .filter_map(bounding_box)
        .collect()
}

/// Candidate code-block regions of `image`, largest first, at most
/// `preset.max_regions` of them. Every region is strictly larger than the
/// preset's minimum width and height. Overlapping regions are returned as-is.
pub fn locate_regions(image: &DynamicImage, preset: &LocatorPreset) -> Vec<Region> {
    let gray = image.to_luma8();
    let mask = band_mask(&gray, preset.band_low, preset.band_high);
    let mask = clean_mask(&mask, preset.kernel_size, preset.open);

    let mut regions: Vec<Region> = external_boxes(&mask)
        .into_iter()
        .filter(|r| r.width > preset.min_width && r.height > preset.min_height)
        .collect();

    regions.sort_by(|a, b| b.area().cmp(&a.area()).then((a.y, a.x).cmp(&(b.y, b.x))));
    regions.truncate(preset.max_regions);

    debug!(
        "located {} region(s) in {}x{} bitmap",
        regions.len(),
        gray.width(),
        gray.height()
    );
    regions
}

// ---------------------------------------------------------------------------
// Line-number corroboration
// ---------------------------------------------------------------------------

/// The strip along the left edge of `region` where printed line numbers sit:
/// `min(max_width, region.width / 10)` pixels wide, full height.
pub fn left_strip(region: &Region, max_width: u32) -> Region {
    let width = max_width.min(region.width / 10).max(1);
    Region::new(region.x, region.y, width, region.height)
}

/// Number of recognised lines made only of ASCII digits.
pub fn count_numeric_lines(text: &str) -> usize {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .count()
}

/// Cut `region` out of `image`, clamped to the image bounds.
pub fn crop(image: &DynamicImage, region: &Region) -> DynamicImage {
    let x = region.x.min(image.width());
    let y = region.y.min(image.height());
    let width = region.width.min(image.width() - x);
    let height = region.height.min(image.height() - y);
    image.crop_imm(x, y, width, height)
}

/// The region touches the bottom `band` fraction of a page `page_height`
/// pixels tall.
pub fn reaches_page_bottom(region: &Region, page_height: u32, band: f32) -> bool {
    if page_height == 0 {
        return false;
    }
    let threshold = page_height as f32 * (1.0 - band);
    region.bottom() as f32 >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHADE: u8 = 238;
    const PAPER: u8 = 255;

    /// White page with shaded rectangles `(x, y, w, h)`.
    fn page(width: u32, height: u32, boxes: &[(u32, u32, u32, u32)]) -> DynamicImage {
        let img = GrayImage::from_fn(width, height, |x, y| {
            let inside = boxes
                .iter()
                .any(|&(bx, by, bw, bh)| x >= bx && x < bx + bw && y >= by && y < by + bh);
            Luma([if inside { SHADE } else { PAPER }])
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_uniform_image_outside_band_yields_nothing() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(800, 600, Luma([PAPER])));
        assert!(locate_regions(&blank, &LocatorPreset::coarse()).is_empty());

        let dark = DynamicImage::ImageLuma8(GrayImage::from_pixel(800, 600, Luma([40])));
        assert!(locate_regions(&dark, &LocatorPreset::coarse()).is_empty());
    }

    #[test]
    fn test_band_mask_is_inclusive() {
        let gray = GrayImage::from_fn(4, 1, |x, _| Luma([[229u8, 230, 245, 246][x as usize]]));
        let mask = band_mask(&gray, 230, 245);
        let values: Vec<u8> = mask.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 255, 255, 0]);
    }

    #[test]
    fn test_single_shaded_box_found() {
        let image = page(800, 600, &[(100, 50, 400, 200)]);
        let regions = locate_regions(&image, &LocatorPreset::coarse());
        assert_eq!(regions, vec![Region::new(100, 50, 400, 200)]);
    }

    #[test]
    fn test_small_boxes_filtered_by_preset() {
        // 250x80 is too small for the coarse preset but fine for the stricter one.
        let image = page(800, 600, &[(50, 50, 250, 80)]);
        assert!(locate_regions(&image, &LocatorPreset::coarse()).is_empty());
        let found = locate_regions(&image, &LocatorPreset::line_number_aware());
        assert_eq!(found.len(), 1);
        assert!(found[0].width > 200 && found[0].height > 50);
    }

    #[test]
    fn test_size_threshold_is_strict() {
        let image = page(800, 600, &[(50, 50, 300, 150)]);
        assert!(locate_regions(&image, &LocatorPreset::coarse()).is_empty());
    }

    #[test]
    fn test_at_most_max_regions_ranked_by_area() {
        let image = page(
            1200,
            1600,
            &[
                (20, 20, 320, 120),
                (20, 200, 500, 300),
                (20, 560, 400, 200),
                (20, 820, 350, 150),
            ],
        );
        let regions = locate_regions(&image, &LocatorPreset::coarse());
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0], Region::new(20, 200, 500, 300));
        assert_eq!(regions[1], Region::new(20, 560, 400, 200));
        assert_eq!(regions[2], Region::new(20, 820, 350, 150));
        assert!(regions.windows(2).all(|w| w[0].area() >= w[1].area()));
    }

    #[test]
    fn test_closing_bridges_small_gaps() {
        // Two halves separated by a 3px white gutter read as one block.
        let image = page(800, 600, &[(100, 100, 200, 150), (303, 100, 200, 150)]);
        let regions = locate_regions(&image, &LocatorPreset::coarse());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].x, 100);
        assert_eq!(regions[0].width, 403);
    }

    #[test]
    fn test_left_strip_width() {
        assert_eq!(left_strip(&Region::new(10, 20, 800, 300), 50), Region::new(10, 20, 50, 300));
        assert_eq!(left_strip(&Region::new(10, 20, 300, 300), 50), Region::new(10, 20, 30, 300));
    }

    #[test]
    fn test_count_numeric_lines() {
        assert_eq!(count_numeric_lines("1\n2\n 3 \nfoo\n4a\n\n"), 3);
        assert_eq!(count_numeric_lines(""), 0);
    }

    #[test]
    fn test_crop_is_clamped() {
        let image = page(100, 100, &[]);
        let cropped = crop(&image, &Region::new(80, 90, 50, 50));
        assert_eq!((cropped.width(), cropped.height()), (20, 10));
    }

    #[test]
    fn test_reaches_page_bottom() {
        assert!(reaches_page_bottom(&Region::new(0, 800, 100, 160), 1000, 0.05));
        assert!(!reaches_page_bottom(&Region::new(0, 100, 100, 100), 1000, 0.05));
        assert!(!reaches_page_bottom(&Region::new(0, 0, 10, 10), 0, 0.05));
    }
}
