use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    ClassificationMethod, DocumentType, ExtractionMethod, PipelineStage, StageStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub community_id: Option<Uuid>,
    /// Path of the binary inside the blob store.
    pub file_path: String,
    pub original_filename: String,
    /// SHA-256 of the file contents, hex-encoded. Doubles as the ETag.
    pub content_hash: String,
    /// Requested processing level, 1–4.
    pub processing_level: u8,
    pub extraction_status: StageStatus,
    pub classification_status: StageStatus,
    pub metadata_status: StageStatus,
    pub chunking_status: StageStatus,
    pub extracted_text: Option<String>,
    pub document_type: Option<DocumentType>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Document {
    pub fn stage_status(&self, stage: PipelineStage) -> StageStatus {
        match stage {
            PipelineStage::Extraction => self.extraction_status,
            PipelineStage::Classification => self.classification_status,
            PipelineStage::Metadata => self.metadata_status,
            PipelineStage::Chunking => self.chunking_status,
        }
    }

    pub fn set_stage_status(&mut self, stage: PipelineStage, status: StageStatus) {
        match stage {
            PipelineStage::Extraction => self.extraction_status = status,
            PipelineStage::Classification => self.classification_status = status,
            PipelineStage::Metadata => self.metadata_status = status,
            PipelineStage::Chunking => self.chunking_status = status,
        }
    }

    /// File extension of the original filename, lowercased, without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.original_filename)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Result of the text extraction stage. One per document, overwritten on
/// reprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub document_id: Uuid,
    pub method: ExtractionMethod,
    pub text: String,
    pub char_count: usize,
    pub page_count: usize,
}

/// Result of the classification stage. One-to-one with the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub document_id: Uuid,
    pub document_type: DocumentType,
    pub confidence: f32,
    pub method: ClassificationMethod,
    pub reasoning: Option<String>,
    pub fallback_used: bool,
}

/// Overlapping text segment for retrieval indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: usize,
    pub content: String,
    pub char_offset: usize,
}
