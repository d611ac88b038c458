//! Extraction strategy chain.
//!
//! Strategies run in a fixed order — direct PDF text layer, then OCR, then
//! AI vision — and the first one yielding at least `MIN_TEXT_CHARS` of
//! non-whitespace text wins. A strategy error is logged and the chain moves
//! on; only when every applicable strategy has been tried does the chain
//! fail, reporting which methods were attempted.

use super::types::{
    ExtractionOutcome, OcrEngine, PdfExtractor, TextExtractor, VisionExtractor,
};
use super::{ExtractionError, MIN_TEXT_CHARS};
use crate::models::enums::ExtractionMethod;

/// Concrete implementation of the text extractor.
/// Uses trait objects for each strategy, enabling dependency injection.
pub struct DocumentExtractor {
    pdf_extractor: Box<dyn PdfExtractor>,
    ocr_engine: Box<dyn OcrEngine>,
    vision_extractor: Box<dyn VisionExtractor>,
}

impl DocumentExtractor {
    pub fn new(
        pdf_extractor: Box<dyn PdfExtractor>,
        ocr_engine: Box<dyn OcrEngine>,
        vision_extractor: Box<dyn VisionExtractor>,
    ) -> Self {
        Self {
            pdf_extractor,
            ocr_engine,
            vision_extractor,
        }
    }
}

fn usable(text: &str) -> bool {
    text.chars().filter(|c| !c.is_whitespace()).count() >= MIN_TEXT_CHARS
}

/// Pages in a direct PDF parse; pdf-extract separates pages with form feeds.
fn pdf_page_count(text: &str) -> usize {
    text.split('\u{0C}')
        .filter(|page| !page.trim().is_empty())
        .count()
        .max(1)
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, bytes: &[u8], extension: &str) -> Result<ExtractionOutcome, ExtractionError> {
        let mut attempted = Vec::new();

        // Strategy 1: direct PDF text layer
        if extension.eq_ignore_ascii_case("pdf") {
            attempted.push(ExtractionMethod::PdfDirect);
            match self.pdf_extractor.extract_text(bytes) {
                Ok(text) if usable(&text) => {
                    let page_count = pdf_page_count(&text);
                    return Ok(ExtractionOutcome {
                        text,
                        method: ExtractionMethod::PdfDirect,
                        page_count,
                        attempted,
                        prompt_tokens: 0,
                        completion_tokens: 0,
                    });
                }
                Ok(text) => {
                    tracing::debug!(
                        chars = text.trim().len(),
                        "Direct PDF text below threshold, falling through to OCR"
                    );
                }
                Err(e) => {
                    tracing::warn!("Direct PDF extraction failed: {e}");
                }
            }
        }

        // Strategy 2: OCR
        attempted.push(ExtractionMethod::Ocr);
        match self.ocr_engine.ocr_document(bytes, extension) {
            Ok(text) if usable(&text) => {
                return Ok(ExtractionOutcome {
                    text,
                    method: ExtractionMethod::Ocr,
                    page_count: 1,
                    attempted,
                    prompt_tokens: 0,
                    completion_tokens: 0,
                });
            }
            Ok(_) => {
                tracing::debug!("OCR text below threshold, falling through to vision");
            }
            Err(e) => {
                tracing::warn!("OCR extraction failed: {e}");
            }
        }

        // Strategy 3: AI vision
        attempted.push(ExtractionMethod::AiVision);
        match self.vision_extractor.extract_text(bytes) {
            Ok((text, prompt_tokens, completion_tokens)) if usable(&text) => {
                Ok(ExtractionOutcome {
                    text,
                    method: ExtractionMethod::AiVision,
                    page_count: 1,
                    attempted,
                    prompt_tokens,
                    completion_tokens,
                })
            }
            Ok(_) => Err(ExtractionError::AllStrategiesFailed { attempted }),
            Err(e) => {
                tracing::warn!("Vision extraction failed: {e}");
                Err(ExtractionError::AllStrategiesFailed { attempted })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubPdf(Result<String, ()>);
    impl PdfExtractor for StubPdf {
        fn extract_text(&self, _pdf_bytes: &[u8]) -> Result<String, ExtractionError> {
            self.0
                .clone()
                .map_err(|_| ExtractionError::PdfParsing("stub".into()))
        }
    }

    struct StubOcr(Result<String, ()>);
    impl OcrEngine for StubOcr {
        fn ocr_document(&self, _bytes: &[u8], _extension: &str) -> Result<String, ExtractionError> {
            self.0
                .clone()
                .map_err(|_| ExtractionError::OcrProcessing("stub".into()))
        }
    }

    struct StubVision(Result<String, ()>);
    impl VisionExtractor for StubVision {
        fn extract_text(&self, _bytes: &[u8]) -> Result<(String, u64, u64), ExtractionError> {
            self.0
                .clone()
                .map(|t| (t, 500, 40))
                .map_err(|_| ExtractionError::Vision(crate::llm::LlmError::Connection("x".into())))
        }
    }

    fn long_text() -> String {
        "Acta de la junta ordinaria de propietarios celebrada el quince de marzo.".into()
    }

    #[test]
    fn digital_pdf_stops_at_first_strategy() {
        let extractor = DocumentExtractor::new(
            Box::new(StubPdf(Ok(long_text()))),
            Box::new(StubOcr(Err(()))),
            Box::new(StubVision(Err(()))),
        );

        let outcome = extractor.extract(b"%PDF", "pdf").unwrap();
        assert_eq!(outcome.method, ExtractionMethod::PdfDirect);
        assert_eq!(outcome.attempted, vec![ExtractionMethod::PdfDirect]);
        assert_eq!(outcome.page_count, 1);
    }

    #[test]
    fn multi_page_pdf_reports_form_feed_separated_pages() {
        let three_pages = format!(
            "{}\u{0C}{}\u{0C}{}\u{0C}",
            long_text(),
            long_text(),
            long_text()
        );
        let extractor = DocumentExtractor::new(
            Box::new(StubPdf(Ok(three_pages))),
            Box::new(StubOcr(Err(()))),
            Box::new(StubVision(Err(()))),
        );

        let outcome = extractor.extract(b"%PDF", "pdf").unwrap();
        assert_eq!(outcome.page_count, 3);
    }

    #[test]
    fn short_pdf_text_falls_through_to_ocr() {
        let extractor = DocumentExtractor::new(
            Box::new(StubPdf(Ok("  \n ".into()))),
            Box::new(StubOcr(Ok(long_text()))),
            Box::new(StubVision(Err(()))),
        );

        let outcome = extractor.extract(b"%PDF", "pdf").unwrap();
        assert_eq!(outcome.method, ExtractionMethod::Ocr);
        assert_eq!(outcome.page_count, 1);
        assert_eq!(
            outcome.attempted,
            vec![ExtractionMethod::PdfDirect, ExtractionMethod::Ocr]
        );
    }

    #[test]
    fn non_pdf_skips_direct_strategy() {
        let extractor = DocumentExtractor::new(
            Box::new(StubPdf(Err(()))),
            Box::new(StubOcr(Ok(long_text()))),
            Box::new(StubVision(Err(()))),
        );

        let outcome = extractor.extract(b"\x89PNG", "png").unwrap();
        assert_eq!(outcome.attempted, vec![ExtractionMethod::Ocr]);
    }

    #[test]
    fn vision_is_last_resort_and_carries_tokens() {
        let extractor = DocumentExtractor::new(
            Box::new(StubPdf(Err(()))),
            Box::new(StubOcr(Err(()))),
            Box::new(StubVision(Ok(long_text()))),
        );

        let outcome = extractor.extract(b"%PDF", "pdf").unwrap();
        assert_eq!(outcome.method, ExtractionMethod::AiVision);
        assert_eq!(outcome.prompt_tokens, 500);
        assert_eq!(
            outcome.attempted,
            vec![
                ExtractionMethod::PdfDirect,
                ExtractionMethod::Ocr,
                ExtractionMethod::AiVision
            ]
        );
    }

    #[test]
    fn all_failures_report_attempted_methods() {
        let extractor = DocumentExtractor::new(
            Box::new(StubPdf(Err(()))),
            Box::new(StubOcr(Err(()))),
            Box::new(StubVision(Err(()))),
        );

        let err = extractor.extract(b"%PDF", "pdf").unwrap_err();
        match err {
            ExtractionError::AllStrategiesFailed { attempted } => {
                assert_eq!(attempted.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
