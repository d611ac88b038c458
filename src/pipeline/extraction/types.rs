use super::ExtractionError;
use crate::models::enums::ExtractionMethod;

/// Result of text extraction from a single document.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub text: String,
    pub method: ExtractionMethod,
    /// Pages the winning strategy read. Direct PDF parsing counts the
    /// form-feed separated pages; OCR and vision read one image each.
    pub page_count: usize,
    /// Strategies tried before one produced usable text (in order).
    pub attempted: Vec<ExtractionMethod>,
    /// Token usage when the AI vision strategy ran; zero otherwise.
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Direct text-layer extraction from a digital PDF.
pub trait PdfExtractor: Send + Sync {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// OCR engine abstraction (allows mocking for tests).
pub trait OcrEngine: Send + Sync {
    fn ocr_document(&self, bytes: &[u8], extension: &str) -> Result<String, ExtractionError>;
}

/// AI vision extraction abstraction.
pub trait VisionExtractor: Send + Sync {
    /// Returns the extracted text and (prompt, completion) token counts.
    fn extract_text(&self, bytes: &[u8]) -> Result<(String, u64, u64), ExtractionError>;
}

/// Main extraction orchestrator trait.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], extension: &str) -> Result<ExtractionOutcome, ExtractionError>;
}
