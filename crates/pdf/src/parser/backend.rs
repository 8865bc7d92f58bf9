use std::collections::BTreeMap;

use lopdf::{self, content::Content};

use crate::{PageSize, PdfError};

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// lopdf-independent PDF value, so the text walker can be fed from fixtures.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    pub fn new(operator: &str, operands: Vec<PdfValue>) -> Self {
        ContentOp {
            operator: operator.to_string(),
            operands,
        }
    }

    /// Operand `index` as a number, if it is one.
    pub fn number(&self, index: usize) -> Option<f32> {
        self.operands.get(index).and_then(get_number_from_value)
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// `Integer` and `Real` both read as `f32`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f32> {
    match val {
        PdfValue::Integer(i) => Some(*i as f32),
        PdfValue::Real(f) => Some(*f),
        _ => None,
    }
}

/// Convert a `lopdf::Object`. Stream bodies are dropped; only their
/// dictionaries survive.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    let entries = |dict: &lopdf::Dictionary| {
        dict.iter()
            .map(|(k, v)| (k.clone(), convert_object(v)))
            .collect()
    };
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(entries(dict)),
        lopdf::Object::Stream(stream) => PdfValue::Dict(entries(&stream.dict)),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

/// Best-effort decoding of PDF string bytes: UTF-16BE with BOM, then UTF-8,
/// then Latin-1.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let code_units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// What the text walker needs from a parsed document.
pub trait PdfBackend {
    /// 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Decoded content-stream operations of a page.
    fn page_ops(&self, page: PageId) -> Result<Vec<ContentOp>, PdfError>;

    /// Decode the bytes of a text-showing operand drawn with `font_name`.
    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Resolve a 1-based page number.
    pub fn page_id(&self, page: usize) -> Result<PageId, PdfError> {
        u32::try_from(page)
            .ok()
            .and_then(|number| self.doc.get_pages().get(&number).copied())
            .ok_or(PdfError::PageNotFound(page))
    }

    /// Page size from the (possibly inherited) MediaBox.
    pub fn page_size(&self, page: PageId) -> Result<PageSize, PdfError> {
        let page_dict = self.page_dict(page)?;
        let media_box = self
            .inherited(page_dict, b"MediaBox")
            .and_then(|obj| self.resolve(obj).as_array().ok())
            .ok_or_else(|| PdfError::Parse("MediaBox not found for page".into()))?;

        let nums: Vec<f32> = media_box
            .iter()
            .filter_map(|obj| match self.resolve(obj) {
                lopdf::Object::Integer(i) => Some(*i as f32),
                lopdf::Object::Real(f) => Some(*f),
                _ => None,
            })
            .collect();
        if nums.len() < 4 {
            return Err(PdfError::Parse(format!(
                "MediaBox has {} numeric elements, expected 4",
                nums.len()
            )));
        }

        Ok(PageSize {
            width: (nums[2] - nums[0]).abs(),
            height: (nums[3] - nums[1]).abs(),
        })
    }

    pub(crate) fn page_dict(&self, page: PageId) -> Result<&lopdf::Dictionary, PdfError> {
        self.doc
            .get_object(page)
            .and_then(|obj| obj.as_dict())
            .map_err(|e| PdfError::Parse(format!("page object is not a dictionary: {}", e)))
    }

    /// Look `key` up on a page node, walking up through `Parent` for
    /// inheritable attributes (MediaBox, Resources).
    pub(crate) fn inherited<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a lopdf::Object> {
        if let Ok(obj) = dict.get(key) {
            return Some(obj);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        self.inherited(parent, key)
    }

    /// Follow one level of indirection.
    pub(crate) fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    fn font_encoding_name(&self, page: PageId, font_name: &[u8]) -> Option<String> {
        let fonts = self.doc.get_page_fonts(page).ok()?;
        match fonts.get(font_name)?.get(b"Encoding").ok()? {
            lopdf::Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_ops(&self, page: PageId) -> Result<Vec<ContentOp>, PdfError> {
        let data = self
            .doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))?;
        let content = Content::decode(&data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String {
        // Identity-H/V fonts carry 2-byte codes, commonly Unicode in scans
        // with an OCR text layer.
        let identity = self
            .font_encoding_name(page, font_name)
            .is_some_and(|enc| enc.contains("Identity"));
        if identity && bytes.len() >= 2 && bytes.len() % 2 == 0 {
            let code_units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            let decoded = String::from_utf16_lossy(&code_units);
            if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                return decoded;
            }
        }

        decode_text_simple(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{sample_pdf, FixturePage};

    #[test]
    fn decode_text_simple_utf8() {
        assert_eq!(decode_text_simple("print(x)".as_bytes()), "print(x)");
        assert_eq!(decode_text_simple("說明".as_bytes()), "說明");
    }

    #[test]
    fn decode_text_simple_latin1() {
        let input: &[u8] = &[0x63, 0x61, 0x66, 0xE9];
        assert_eq!(decode_text_simple(input), "caf\u{00E9}");
    }

    #[test]
    fn decode_text_simple_utf16be() {
        let input: &[u8] = &[0xFE, 0xFF, 0x8A, 0xAA, 0x66, 0x0E, 0x00];
        assert_eq!(decode_text_simple(input), "說明");
    }

    #[test]
    fn get_number_from_non_numeric() {
        assert_eq!(get_number_from_value(&PdfValue::Integer(42)), Some(42.0));
        assert_eq!(get_number_from_value(&PdfValue::Real(2.5)), Some(2.5));
        assert_eq!(get_number_from_value(&PdfValue::Null), None);
        assert_eq!(get_number_from_value(&PdfValue::Name(b"F1".to_vec())), None);
    }

    #[test]
    fn convert_stream_uses_dict() {
        let mut dict = lopdf::Dictionary::new();
        dict.set("Length", lopdf::Object::Integer(0));
        let obj = lopdf::Object::Stream(lopdf::Stream::new(dict, vec![]));
        match convert_object(&obj) {
            PdfValue::Dict(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].0, b"Length");
            }
            other => panic!("expected Dict for stream, got {:?}", other),
        }
    }

    #[test]
    fn content_op_number() {
        let op = ContentOp::new("Td", vec![PdfValue::Integer(72), PdfValue::Name(b"x".to_vec())]);
        assert_eq!(op.number(0), Some(72.0));
        assert_eq!(op.number(1), None);
        assert_eq!(op.number(2), None);
    }

    #[test]
    fn backend_resolves_pages_and_sizes() {
        let bytes = sample_pdf(&[FixturePage::text(&["one"]), FixturePage::text(&["two"])]);
        let backend = LopdfBackend::load_bytes(&bytes).unwrap();
        assert_eq!(backend.page_count(), 2);
        let id = backend.page_id(2).unwrap();
        let size = backend.page_size(id).unwrap();
        assert_eq!((size.width, size.height), (595.0, 842.0));
        assert!(matches!(backend.page_id(3), Err(PdfError::PageNotFound(3))));
        assert!(matches!(backend.page_id(0), Err(PdfError::PageNotFound(0))));
    }

    #[test]
    fn backend_rejects_garbage() {
        assert!(matches!(
            LopdfBackend::load_bytes(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }
}
