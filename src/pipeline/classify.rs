//! Document type classification.
//!
//! Filename keyword rules run first and never touch the model; only when
//! no rule matches (and AI is enabled) does a single model call decide
//! over the closed label set. An answer outside the set falls back to
//! `Unclassified` rather than inventing a label.

use std::str::FromStr;
use std::sync::Arc;

use crate::llm::{LlmClient, LlmError};
use crate::models::enums::{ClassificationMethod, DocumentType};

/// Confidence recorded for filename rule matches.
const RULE_CONFIDENCE: f64 = 0.9;

#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("AI classification failed: {0}")]
    Llm(#[from] LlmError),
}

/// Outcome of classifying one document.
#[derive(Debug, Clone)]
pub struct Classification {
    pub document_type: DocumentType,
    pub method: ClassificationMethod,
    pub confidence: f64,
    /// The matched keyword for rule hits, the raw model answer for AI hits.
    pub reasoning: Option<String>,
    /// True when the model's answer was unusable and we fell back to
    /// `Unclassified`.
    pub fallback_used: bool,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Filename keyword rules, checked in order. Spanish terms first since
/// that is what communities actually upload.
const FILENAME_RULES: &[(&str, DocumentType)] = &[
    ("factura", DocumentType::Invoice),
    ("invoice", DocumentType::Invoice),
    ("contrato", DocumentType::Contract),
    ("acta", DocumentType::Minutes),
    ("minutes", DocumentType::Minutes),
    ("presupuesto", DocumentType::Budget),
    ("budget", DocumentType::Budget),
];

fn classify_by_filename(filename: &str) -> Option<(DocumentType, &'static str)> {
    let lower = filename.to_lowercase();
    FILENAME_RULES
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(keyword, document_type)| (*document_type, *keyword))
}

pub struct Classifier {
    llm: Arc<dyn LlmClient>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classify a document from its filename and extracted text.
    /// `use_ai = false` restricts classification to the filename rules.
    pub fn classify(
        &self,
        filename: &str,
        text: &str,
        use_ai: bool,
    ) -> Result<Classification, ClassificationError> {
        if let Some((document_type, keyword)) = classify_by_filename(filename) {
            tracing::info!(
                filename = %filename,
                document_type = %document_type,
                keyword = keyword,
                "Classified by filename rule"
            );
            return Ok(Classification {
                document_type,
                method: ClassificationMethod::Rule,
                confidence: RULE_CONFIDENCE,
                reasoning: Some(format!("filename contains \"{keyword}\"")),
                fallback_used: false,
                prompt_tokens: 0,
                completion_tokens: 0,
            });
        }

        if !use_ai {
            return Ok(Classification {
                document_type: DocumentType::Unclassified,
                method: ClassificationMethod::Rule,
                confidence: 0.0,
                reasoning: None,
                fallback_used: false,
                prompt_tokens: 0,
                completion_tokens: 0,
            });
        }

        let labels: Vec<&str> = DocumentType::classifiable()
            .iter()
            .map(|t| t.as_str())
            .collect();
        let prompt = format!(
            "Classify this community-management document into exactly one of \
             these categories: {}.\n\nAnswer with only the category name.\n\n\
             Filename: {}\n\nDocument text:\n{}",
            labels.join(", "),
            filename,
            truncate(text, 4000)
        );

        let response = self.llm.generate(
            &prompt,
            "You are a document classifier for a residential community manager.",
        )?;

        let answer = response.text.trim().trim_matches('"').to_lowercase();
        let (document_type, fallback_used) = match DocumentType::from_str(&answer) {
            Ok(t) if DocumentType::classifiable().contains(&t) => (t, false),
            _ => {
                tracing::warn!(answer = %answer, "AI returned a label outside the closed set");
                (DocumentType::Unclassified, true)
            }
        };

        Ok(Classification {
            document_type,
            method: ClassificationMethod::Ai,
            confidence: if fallback_used { 0.0 } else { 0.75 },
            reasoning: Some(response.text.trim().to_string()),
            fallback_used,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
