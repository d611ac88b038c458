//! AI vision extraction — last resort of the chain.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::types::VisionExtractor;
use super::ExtractionError;
use crate::llm::LlmClient;

const VISION_PROMPT: &str = "Transcribe all text visible in this document image. \
Output only the transcribed text, preserving reading order. \
Do not summarize, translate, or add commentary.";

/// Vision extractor backed by a multimodal model behind `LlmClient`.
pub struct LlmVisionExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmVisionExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

impl VisionExtractor for LlmVisionExtractor {
    fn extract_text(&self, bytes: &[u8]) -> Result<(String, u64, u64), ExtractionError> {
        let encoded = BASE64.encode(bytes);
        let response = self.llm.generate_with_images(VISION_PROMPT, &[encoded])?;
        Ok((
            response.text,
            response.prompt_tokens,
            response.completion_tokens,
        ))
    }
}
