pub mod extractor;
pub mod parser;

pub use extractor::{FieldExtraction, FieldExtractor};
pub use parser::parse_json_response;

use crate::models::enums::DocumentType;

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("No active prompt template for document type: {document_type}")]
    TemplateNotFound { document_type: DocumentType },

    #[error("Failed to parse model response: {reason}")]
    ParseFailed {
        reason: String,
        /// Full raw model response, kept for debugging and re-runs.
        raw_response: String,
    },

    #[error("AI field extraction failed: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}
