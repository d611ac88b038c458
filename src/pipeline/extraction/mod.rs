pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod types;
pub mod vision;

pub use orchestrator::DocumentExtractor;
pub use types::{ExtractionOutcome, OcrEngine, PdfExtractor, TextExtractor, VisionExtractor};

use thiserror::Error;

use crate::models::enums::ExtractionMethod;

/// Extracted text shorter than this is treated as an extraction miss and
/// the next strategy in the chain is tried.
pub const MIN_TEXT_CHARS: usize = 50;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("OCR timed out after {0}s")]
    OcrTimeout(u64),

    #[error("AI vision extraction failed: {0}")]
    Vision(#[from] crate::llm::LlmError),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),

    #[error("All extraction strategies failed (attempted: {})", format_methods(.attempted))]
    AllStrategiesFailed { attempted: Vec<ExtractionMethod> },
}

fn format_methods(methods: &[ExtractionMethod]) -> String {
    methods
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
