use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::DocumentType;

/// Named, versioned prompt blueprint with `{placeholder}` variables.
/// Looked up by name + active flag at field-extraction time; at most one
/// active template per name (enforced by a partial unique index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub name: String,
    pub version: i64,
    pub document_type: DocumentType,
    pub body: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

impl PromptTemplate {
    /// Substitute `{name}` placeholders with the given values.
    /// Unknown placeholders are left verbatim.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.body.clone();
        for (name, value) in vars {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}
