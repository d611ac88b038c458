//! Structured field extraction.
//!
//! One model call per document, prompted by the active template for the
//! document's type. The template is looked up at call time so activating
//! a new version takes effect on the next run without a restart.

use std::sync::Arc;

use rusqlite::Connection;

use super::parser::parse_json_response;
use super::FieldError;
use crate::db::repository::template::get_active_template_for_type;
use crate::llm::LlmClient;
use crate::models::enums::DocumentType;
use crate::models::{ExtractedFields, PromptTemplate};

const SYSTEM_PROMPT: &str = "You extract structured data from community-management \
documents. Answer with a single JSON object and nothing else. Use null for \
fields you cannot find.";

/// Result of one field extraction run.
#[derive(Debug, Clone)]
pub struct FieldExtraction {
    pub fields: ExtractedFields,
    pub raw_response: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

pub struct FieldExtractor {
    llm: Arc<dyn LlmClient>,
}

impl FieldExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Look up the active prompt template for a document type. Split from
    /// [`extract`](Self::extract) so callers can release the database
    /// connection before the model call.
    pub fn active_template(
        conn: &Connection,
        document_type: DocumentType,
    ) -> Result<PromptTemplate, FieldError> {
        get_active_template_for_type(conn, document_type)?
            .ok_or(FieldError::TemplateNotFound { document_type })
    }

    /// Extract typed fields from a classified document's text.
    pub fn extract(
        &self,
        template: &PromptTemplate,
        text: &str,
    ) -> Result<FieldExtraction, FieldError> {
        let document_type = template.document_type;
        let prompt = template.render(&[("document_text", text)]);

        tracing::info!(
            document_type = %document_type,
            template = %template.name,
            template_version = template.version,
            "Running field extraction"
        );

        let response = self.llm.generate(&prompt, SYSTEM_PROMPT)?;

        let mut value = parse_json_response(&response.text)?;

        // The serde tag comes from the classification, not the model
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "document_type".to_string(),
                serde_json::Value::String(document_type.as_str().to_string()),
            );
        }

        let fields: ExtractedFields =
            serde_json::from_value(value).map_err(|e| FieldError::ParseFailed {
                reason: e.to_string(),
                raw_response: response.text.clone(),
            })?;

        Ok(FieldExtraction {
            fields,
            raw_response: response.text,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::template::insert_template;
    use crate::db::sqlite::open_memory_database;
    use crate::llm::MockLlmClient;
    use crate::models::PromptTemplate;
    use chrono::Utc;
    use uuid::Uuid;

    fn seed_template(conn: &Connection, document_type: DocumentType) {
        insert_template(
            conn,
            &PromptTemplate {
                id: Uuid::new_v4(),
                name: format!("{}_fields", document_type.as_str()),
                version: 1,
                document_type,
                body: "Extract the fields from:\n{document_text}".into(),
                active: true,
                created_at: Utc::now().naive_utc(),
            },
        )
        .unwrap();
    }

    #[test]
    fn extracts_invoice_fields_from_fenced_response() {
        let conn = open_memory_database().unwrap();
        seed_template(&conn, DocumentType::Invoice);

        let mock = Arc::new(MockLlmClient::new(
            "```json\n{\"vendor\": \"Limpiezas Sol\", \"total_amount\": 420.5, \"currency\": \"EUR\"}\n```",
        ));
        let extractor = FieldExtractor::new(mock.clone());

        let template = FieldExtractor::active_template(&conn, DocumentType::Invoice).unwrap();
        let extraction = extractor.extract(&template, "Factura...").unwrap();

        match extraction.fields {
            ExtractedFields::Invoice(fields) => {
                assert_eq!(fields.vendor.as_deref(), Some("Limpiezas Sol"));
                assert_eq!(fields.total_amount, Some(420.5));
            }
            other => panic!("wrong variant: {other:?}"),
        }
        assert_eq!(mock.call_count(), 1);
        assert!(extraction.raw_response.contains("Limpiezas Sol"));
    }

    #[test]
    fn missing_template_is_a_distinct_error() {
        let conn = open_memory_database().unwrap();

        let err = FieldExtractor::active_template(&conn, DocumentType::Contract).unwrap_err();
        assert!(matches!(
            err,
            FieldError::TemplateNotFound {
                document_type: DocumentType::Contract
            }
        ));
    }

    #[test]
    fn parse_failure_preserves_raw_response() {
        let conn = open_memory_database().unwrap();
        seed_template(&conn, DocumentType::Minutes);

        let extractor = FieldExtractor::new(Arc::new(MockLlmClient::new(
            "I am sorry, the document is illegible.",
        )));

        let template = FieldExtractor::active_template(&conn, DocumentType::Minutes).unwrap();
        let err = extractor.extract(&template, "text").unwrap_err();
        match err {
            FieldError::ParseFailed { raw_response, .. } => {
                assert!(raw_response.contains("illegible"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
