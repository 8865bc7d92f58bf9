//! Page scans embedded as image XObjects.
//!
//! A scanned book stores each page as one large image, sometimes next to
//! small decorations. The largest image on the page is taken as its scan.

use std::io::Cursor;

use log::debug;

use crate::parser::backend::{LopdfBackend, PageId};
use crate::types::{ImageFormat, PageScan};
use crate::PdfError;

// ---------------------------------------------------------------------------
// Pure types for raw image handling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
}

/// Pixel layout of an unfiltered (or Flate-compressed) image stream.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawImageMeta {
    width: u32,
    height: u32,
    bits_per_component: u8,
    channels: u8,
    color_space: ColorSpace,
}

impl RawImageMeta {
    /// Rows are padded to whole bytes.
    fn expected_byte_count(&self) -> usize {
        let bits_per_row =
            self.width as usize * self.channels as usize * self.bits_per_component as usize;
        bits_per_row.div_ceil(8) * self.height as usize
    }
}

/// Magic-byte detection for the codecs page scans use.
pub fn detect_image_format(bytes: &[u8]) -> ImageFormat {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => ImageFormat::Png,
        [0x00, 0x00, 0x00, 0x0C, b'j', b'P', 0x20, 0x20, ..] => ImageFormat::Jpeg2000,
        [0xFF, 0x4F, 0xFF, 0x51, ..] => ImageFormat::Jpeg2000,
        _ => ImageFormat::Unknown,
    }
}

/// `DCTDecode` streams are JPEG files, `JPXDecode` streams JPEG 2000.
pub fn format_from_pdf_filter(filter_name: &str) -> ImageFormat {
    match filter_name {
        "DCTDecode" => ImageFormat::Jpeg,
        "JPXDecode" => ImageFormat::Jpeg2000,
        _ => ImageFormat::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Pure image conversion functions
// ---------------------------------------------------------------------------

fn extract_image_meta(dict: &lopdf::Dictionary) -> Option<RawImageMeta> {
    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    let bits_per_component = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|obj| obj.as_i64().ok())
        .map(|v| v as u8)
        .unwrap_or(8);

    let (color_space, channels) = match dict.get(b"ColorSpace").ok()?.as_name().ok()? {
        b"DeviceGray" => (ColorSpace::Gray, 1),
        b"DeviceRGB" => (ColorSpace::Rgb, 3),
        b"DeviceCMYK" => (ColorSpace::Cmyk, 4),
        _ => return None,
    };

    Some(RawImageMeta {
        width,
        height,
        bits_per_component,
        channels,
        color_space,
    })
}

fn encode_raw_as_png(meta: &RawImageMeta, raw_bytes: &[u8]) -> Option<Vec<u8>> {
    if raw_bytes.len() != meta.expected_byte_count() {
        return None;
    }

    let pixels = if meta.bits_per_component < 8 {
        expand_sub_byte_pixels(raw_bytes, meta)
    } else {
        raw_bytes.to_vec()
    };

    let image = match meta.color_space {
        ColorSpace::Gray => image::DynamicImage::ImageLuma8(image::GrayImage::from_raw(
            meta.width,
            meta.height,
            pixels,
        )?),
        ColorSpace::Rgb => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            meta.width,
            meta.height,
            pixels,
        )?),
        ColorSpace::Cmyk => image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(
            meta.width,
            meta.height,
            cmyk_to_rgb(&pixels),
        )?),
    };

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}

/// Scale 1, 2 or 4-bit samples up to 8 bits.
fn expand_sub_byte_pixels(raw_bytes: &[u8], meta: &RawImageMeta) -> Vec<u8> {
    let samples_per_row = meta.width as usize * meta.channels as usize;
    let bytes_per_row = (samples_per_row * meta.bits_per_component as usize).div_ceil(8);
    let bpc = meta.bits_per_component;
    let max_val = (1u16 << bpc) - 1;
    let per_byte = 8 / bpc as usize;

    let mut result = Vec::with_capacity(samples_per_row * meta.height as usize);
    for row in raw_bytes.chunks_exact(bytes_per_row) {
        let samples = row.iter().flat_map(|&byte| {
            (0..per_byte).map(move |i| {
                let shift = 8 - bpc * (i as u8 + 1);
                let value = (byte >> shift) as u16 & max_val;
                (value * 255 / max_val) as u8
            })
        });
        result.extend(samples.take(samples_per_row));
    }
    result
}

fn cmyk_to_rgb(cmyk_bytes: &[u8]) -> Vec<u8> {
    cmyk_bytes
        .chunks_exact(4)
        .flat_map(|px| {
            let k = px[3] as u16;
            [0, 1, 2].map(|i| 255u16.saturating_sub((px[i] as u16 + k).min(255)) as u8)
        })
        .collect()
}

/// Decode a CCITT Group 4 stream (`K < 0`) into a PNG. Black is 0.
fn decode_ccitt(dict: &lopdf::Dictionary, raw_bytes: &[u8]) -> Option<Vec<u8>> {
    let parms = extract_decode_parms(dict)?;
    let width = parms.get(b"Columns").ok()?.as_i64().ok()? as u16;
    let height = parms
        .get(b"Rows")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .map(|v| v as u16);
    let k = parms.get(b"K").ok().and_then(|o| o.as_i64().ok()).unwrap_or(0);
    if k >= 0 {
        return None;
    }

    let mut rows: Vec<Vec<u8>> = Vec::new();
    fax::decoder::decode_g4(raw_bytes.iter().copied(), width, height, |transitions| {
        rows.push(pack_row_bits(transitions, width));
    })?;
    if rows.is_empty() {
        return None;
    }

    let meta = RawImageMeta {
        width: width as u32,
        height: rows.len() as u32,
        bits_per_component: 1,
        channels: 1,
        color_space: ColorSpace::Gray,
    };
    let pixel_data: Vec<u8> = rows.into_iter().flatten().collect();
    encode_raw_as_png(&meta, &pixel_data)
}

fn extract_decode_parms(dict: &lopdf::Dictionary) -> Option<&lopdf::Dictionary> {
    match dict.get(b"DecodeParms").ok()? {
        lopdf::Object::Dictionary(d) => Some(d),
        lopdf::Object::Array(arr) => arr.first().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

/// Fax transitions to a packed 1-bit row: white bits set, black runs cleared.
/// Runs alternate white/black starting with white.
fn pack_row_bits(transitions: &[u16], width: u16) -> Vec<u8> {
    let mut row = vec![0xFFu8; (width as usize).div_ceil(8)];
    let mut clear = |start: u16, end: u16| {
        for col in start..end.min(width) {
            row[col as usize / 8] &= !(1 << (7 - col as usize % 8));
        }
    };

    let mut black = false;
    let mut start = 0u16;
    for &pos in transitions {
        if black {
            clear(start, pos);
        }
        start = pos;
        black = !black;
    }
    if black {
        clear(start, width);
    }
    row
}

// ---------------------------------------------------------------------------
// Page scan extraction
// ---------------------------------------------------------------------------

/// The largest image drawn by page `number`, as encoded bytes.
pub fn page_scan(
    backend: &LopdfBackend,
    number: usize,
    page: PageId,
) -> Result<PageScan, PdfError> {
    let page_dict = backend.page_dict(page)?;
    let xobjects = backend
        .inherited(page_dict, b"Resources")
        .and_then(|res| backend.resolve(res).as_dict().ok())
        .and_then(|res| res.get(b"XObject").ok())
        .and_then(|xo| backend.resolve(xo).as_dict().ok())
        .ok_or(PdfError::NoPageImage(number))?;

    let largest = xobjects
        .iter()
        .filter_map(|(name, obj)| match backend.resolve(obj) {
            lopdf::Object::Stream(stream) if is_image(&stream.dict) => Some((name, stream)),
            _ => None,
        })
        .max_by_key(|(_, stream)| {
            let dim = |key: &[u8]| stream.dict.get(key).and_then(|o| o.as_i64()).unwrap_or(0);
            dim(b"Width") * dim(b"Height")
        })
        .ok_or(PdfError::NoPageImage(number))?;

    let (name, stream) = largest;
    let name = String::from_utf8_lossy(name).into_owned();
    let meta_dims = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .and_then(|o| o.as_i64())
            .map(|v| v as u32)
            .unwrap_or(0)
    };
    let (width, height) = (meta_dims(b"Width"), meta_dims(b"Height"));
    let filter = extract_filter_name(&stream.dict);
    debug!(
        "page {}: scan {} {}x{} filter {:?}",
        number, name, width, height, filter
    );

    let scan = |format: ImageFormat, bytes: Vec<u8>| PageScan {
        page: number,
        name: name.clone(),
        width,
        height,
        format,
        bytes,
    };

    if filter.as_deref() == Some("CCITTFaxDecode") {
        return decode_ccitt(&stream.dict, &stream.content)
            .map(|png| scan(ImageFormat::Png, png))
            .ok_or_else(|| PdfError::Image(format!("cannot decode fax image {}", name)));
    }

    let format = filter
        .as_deref()
        .map(format_from_pdf_filter)
        .unwrap_or(ImageFormat::Unknown);
    if format != ImageFormat::Unknown {
        return Ok(scan(format, stream.content.clone()));
    }

    let bytes = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    match detect_image_format(&bytes) {
        ImageFormat::Unknown => {}
        detected => return Ok(scan(detected, bytes)),
    }

    extract_image_meta(&stream.dict)
        .and_then(|meta| encode_raw_as_png(&meta, &bytes))
        .map(|png| scan(ImageFormat::Png, png))
        .ok_or_else(|| PdfError::Image(format!("unsupported pixel layout in {}", name)))
}

/// Decode a scan into pixels.
pub fn decode_scan(scan: &PageScan) -> Result<image::DynamicImage, PdfError> {
    let format = match scan.format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        other => {
            return Err(PdfError::Image(format!(
                "page {}: cannot decode {} image",
                scan.page, other
            )))
        }
    };
    image::load_from_memory_with_format(&scan.bytes, format)
        .map_err(|e| PdfError::Image(format!("page {}: {}", scan.page, e)))
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn is_image(dict: &lopdf::Dictionary) -> bool {
    dict.get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .is_some_and(|n| n == b"Image")
}

/// First entry of `Filter`, which may be a name or an array of names.
fn extract_filter_name(dict: &lopdf::Dictionary) -> Option<String> {
    let name = match dict.get(b"Filter").ok()? {
        lopdf::Object::Name(name) => name,
        lopdf::Object::Array(arr) => arr.first()?.as_name().ok()?,
        _ => return None,
    };
    Some(String::from_utf8_lossy(name).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_pdf, FixturePage};

    fn gray_meta(width: u32, height: u32, bpc: u8) -> RawImageMeta {
        RawImageMeta {
            width,
            height,
            bits_per_component: bpc,
            channels: 1,
            color_space: ColorSpace::Gray,
        }
    }

    #[test]
    fn detect_formats() {
        assert_eq!(
            detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]),
            ImageFormat::Jpeg
        );
        assert_eq!(
            detect_image_format(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            ImageFormat::Png
        );
        assert_eq!(
            detect_image_format(&[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20]),
            ImageFormat::Jpeg2000
        );
        assert_eq!(detect_image_format(&[0xFF]), ImageFormat::Unknown);
        assert_eq!(detect_image_format(&[]), ImageFormat::Unknown);
    }

    #[test]
    fn filter_names() {
        assert_eq!(format_from_pdf_filter("DCTDecode"), ImageFormat::Jpeg);
        assert_eq!(format_from_pdf_filter("JPXDecode"), ImageFormat::Jpeg2000);
        assert_eq!(format_from_pdf_filter("FlateDecode"), ImageFormat::Unknown);
    }

    #[test]
    fn expand_one_bit_row() {
        // 0b1010_0000 with width 4 -> white, black, white, black.
        let pixels = expand_sub_byte_pixels(&[0b1010_0000], &gray_meta(4, 1, 1));
        assert_eq!(pixels, vec![255, 0, 255, 0]);
    }

    #[test]
    fn expand_respects_row_padding() {
        // Width 3 at 4 bits: 2 bytes per row, last nibble is padding.
        let pixels = expand_sub_byte_pixels(&[0xF0, 0x80, 0x0F, 0x00], &gray_meta(3, 2, 4));
        assert_eq!(pixels, vec![255, 0, 136, 0, 255, 0]);
    }

    #[test]
    fn cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0, 0, 0, 0, 255]), vec![255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn raw_png_rejects_wrong_length() {
        assert!(encode_raw_as_png(&gray_meta(4, 4, 8), &[0; 15]).is_none());
        assert!(encode_raw_as_png(&gray_meta(4, 4, 8), &[0; 16]).is_some());
    }

    #[test]
    fn pack_row_bits_black_is_zero() {
        // White 0..2, black 2..5, white 5..8.
        assert_eq!(pack_row_bits(&[2, 5], 8), vec![0b1100_0111]);
        // Trailing black run reaches the row end.
        assert_eq!(pack_row_bits(&[6], 8), vec![0b1111_1100]);
        assert_eq!(pack_row_bits(&[], 10), vec![0xFF, 0xFF]);
    }

    #[test]
    fn page_scan_picks_largest_image() {
        let bytes = sample_pdf(&[FixturePage::text(&["1 x = 1"])
            .with_gray_image("Logo", 4, 4, 0)
            .with_gray_image("Scan", 20, 30, 238)]);
        let backend = LopdfBackend::load_bytes(&bytes).unwrap();
        let scan = page_scan(&backend, 1, backend.page_id(1).unwrap()).unwrap();
        assert_eq!(scan.name, "Scan");
        assert_eq!((scan.width, scan.height), (20, 30));
        assert_eq!(scan.format, ImageFormat::Png);

        let image = decode_scan(&scan).unwrap().to_luma8();
        assert_eq!(image.dimensions(), (20, 30));
        assert_eq!(image.get_pixel(5, 5)[0], 238);
    }

    #[test]
    fn page_without_images() {
        let bytes = sample_pdf(&[FixturePage::text(&["only text"])]);
        let backend = LopdfBackend::load_bytes(&bytes).unwrap();
        let err = page_scan(&backend, 1, backend.page_id(1).unwrap()).unwrap_err();
        assert!(matches!(err, PdfError::NoPageImage(1)));
    }

    #[test]
    fn jpeg2000_scan_cannot_be_decoded() {
        let scan = PageScan {
            page: 3,
            name: "Im0".to_string(),
            width: 1,
            height: 1,
            format: ImageFormat::Jpeg2000,
            bytes: vec![],
        };
        assert!(matches!(decode_scan(&scan), Err(PdfError::Image(_))));
    }
}
