use listings_core::types::PageNumber;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid page range: first page {first} is after last page {last}")]
    InvalidPageRange { first: PageNumber, last: PageNumber },

    #[error("{gaps} of {pages} pages failed ({ratio:.2} > {max:.2})")]
    TooManyGaps {
        gaps: usize,
        pages: usize,
        ratio: f64,
        max: f64,
    },

    #[error("OCR command is empty or malformed: {0}")]
    OcrCommand(String),
}
