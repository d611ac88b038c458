use serde::{Deserialize, Serialize};

use super::enums::DocumentType;

/// Business fields produced by the metadata extraction stage.
/// One flat record per document type; every field is optional because the
/// AI response may omit anything it could not find in the text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "document_type", rename_all = "snake_case")]
pub enum ExtractedFields {
    Contract(ContractFields),
    Invoice(InvoiceFields),
    Minutes(MinutesFields),
    Budget(BudgetFields),
    Report(ReportFields),
}

impl ExtractedFields {
    pub fn document_type(&self) -> DocumentType {
        match self {
            Self::Contract(_) => DocumentType::Contract,
            Self::Invoice(_) => DocumentType::Invoice,
            Self::Minutes(_) => DocumentType::Minutes,
            Self::Budget(_) => DocumentType::Budget,
            Self::Report(_) => DocumentType::Report,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContractFields {
    #[serde(default)]
    pub parties: Vec<String>,
    pub subject: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub monthly_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub auto_renewal: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvoiceFields {
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub total_amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub currency: Option<String>,
    pub concept: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MinutesFields {
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub agreements: Vec<String>,
    pub president: Option<String>,
    pub secretary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BudgetFields {
    pub fiscal_year: Option<String>,
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportFields {
    pub subject: Option<String>,
    pub author: Option<String>,
    pub report_date: Option<String>,
    pub summary: Option<String>,
}
