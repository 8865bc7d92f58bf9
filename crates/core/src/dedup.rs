//! Overlap handling between the two detectors.
//!
//! The locator reports overlapping boxes and the text and image detectors can
//! both fire on one listing. Text-derived blocks win: they carry exact line
//! content, while image-derived ones depend on recognition quality.

use crate::types::{DetectionSource, Region, RawBlock};

/// Two regions are duplicates when their intersection covers more than
/// `ratio` of the smaller one.
pub fn overlaps(a: &Region, b: &Region, ratio: f32) -> bool {
    let smaller = a.area().min(b.area());
    if smaller == 0 {
        return false;
    }
    a.intersection_area(b) as f64 > smaller as f64 * ratio as f64
}

/// Drop regions that duplicate a larger one. Input is expected largest first,
/// as returned by the locator; the survivors keep that order.
pub fn dedup_regions(regions: Vec<Region>, ratio: f32) -> Vec<Region> {
    let mut kept: Vec<Region> = Vec::with_capacity(regions.len());
    for region in regions {
        if !kept.iter().any(|k| overlaps(k, &region, ratio)) {
            kept.push(region);
        }
    }
    kept
}

/// Reconcile the blocks found on one page.
///
/// With a text-derived block present, image-derived blocks are dropped and the
/// largest region is attached to the first text block that lacks one.
/// Otherwise the image-derived blocks stand, in reading order (top to bottom,
/// then left to right) so that the merger sees the bottom block of a page
/// last.
pub fn reconcile_page(mut blocks: Vec<RawBlock>, regions: &[Region]) -> Vec<RawBlock> {
    let has_text = blocks
        .iter()
        .any(|b| b.source == DetectionSource::LineNumbers);
    if !has_text {
        blocks.sort_by_key(|b| b.region.map(|r| (r.y, r.x)));
        return blocks;
    }

    let mut largest = regions.iter().max_by_key(|r| r.area()).copied();
    blocks
        .into_iter()
        .filter(|b| b.source == DetectionSource::LineNumbers)
        .map(|mut block| {
            if block.region.is_none() {
                block.region = largest.take();
            }
            block
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_block(page: usize, region: Region) -> RawBlock {
        let mut block = RawBlock::from_text(page, vec!["x = 1".to_string()], String::new(), false);
        block.source = DetectionSource::ImageRegion;
        block.region = Some(region);
        block
    }

    #[test]
    fn test_overlaps_uses_smaller_area() {
        let big = Region::new(0, 0, 1000, 1000);
        let inner = Region::new(10, 10, 100, 100);
        assert!(overlaps(&big, &inner, 0.5));
        assert!(overlaps(&inner, &big, 0.5));
        let beside = Region::new(1000, 0, 100, 100);
        assert!(!overlaps(&big, &beside, 0.5));
    }

    #[test]
    fn test_overlap_threshold_is_strict() {
        let a = Region::new(0, 0, 100, 100);
        let half = Region::new(50, 0, 100, 100);
        assert!(!overlaps(&a, &half, 0.5));
        assert!(overlaps(&a, &half, 0.4));
    }

    #[test]
    fn test_dedup_regions_keeps_larger() {
        let regions = vec![
            Region::new(0, 0, 600, 400),
            Region::new(20, 20, 500, 300),
            Region::new(0, 500, 400, 200),
        ];
        let kept = dedup_regions(regions, 0.5);
        assert_eq!(kept, vec![Region::new(0, 0, 600, 400), Region::new(0, 500, 400, 200)]);
    }

    #[test]
    fn test_text_block_wins_and_gets_region() {
        let region = Region::new(10, 10, 500, 300);
        let blocks = vec![
            image_block(4, region),
            RawBlock::from_text(4, vec!["a = 1".to_string()], String::new(), false),
        ];
        let reconciled = reconcile_page(blocks, &[Region::new(0, 600, 400, 120), region]);
        assert_eq!(reconciled.len(), 1);
        assert_eq!(reconciled[0].source, DetectionSource::LineNumbers);
        assert_eq!(reconciled[0].region, Some(region));
    }

    #[test]
    fn test_image_blocks_stand_without_text() {
        let blocks = vec![
            image_block(4, Region::new(0, 0, 500, 300)),
            image_block(4, Region::new(0, 400, 500, 300)),
        ];
        assert_eq!(reconcile_page(blocks.clone(), &[]), blocks);
    }

    #[test]
    fn test_image_blocks_in_reading_order() {
        // Ranked by area: the large bottom box comes first.
        let bottom = image_block(5, Region::new(50, 500, 600, 480));
        let top_right = image_block(5, Region::new(400, 50, 300, 150));
        let top_left = image_block(5, Region::new(50, 50, 300, 150));
        let reconciled = reconcile_page(vec![bottom.clone(), top_right.clone(), top_left.clone()], &[]);
        assert_eq!(reconciled, vec![top_left, top_right, bottom]);
    }

    #[test]
    fn test_text_block_without_regions() {
        let blocks = vec![RawBlock::from_text(2, vec!["a".to_string()], String::new(), true)];
        let reconciled = reconcile_page(blocks, &[]);
        assert_eq!(reconciled[0].region, None);
    }
}
