//! Document processing orchestrator.
//!
//! Single entry point that drives the four-stage pipeline:
//! extraction → classification → metadata → chunking.
//!
//! Uses trait-based DI for all engines (TextExtractor, LlmClient, BlobStore)
//! so the orchestrator remains fully testable with mock implementations.
//!
//! Runs are level-gated: a request at level L executes stages 1..=L in
//! order, after resetting those stages to pending. Stages above L keep
//! their previous state. At most one run per document at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::chunker::DocumentChunker;
use super::classify::{ClassificationError, Classifier};
use super::extraction::types::TextExtractor;
use super::extraction::ExtractionError;
use super::fields::{FieldError, FieldExtractor};
use crate::db::repository::{
    document as document_repo, results as results_repo,
};
use crate::db::DatabaseError;
use crate::llm::LlmClient;
use crate::models::enums::{DocumentType, PipelineStage, StageStatus};
use crate::models::{ClassificationRecord, Document, DocumentChunk, ExtractionRecord};
use crate::storage::{BlobStore, StorageError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("A pipeline run is already in progress for document {0}")]
    AlreadyRunning(Uuid),

    #[error("Invalid processing level {0} (must be 1-4)")]
    InvalidLevel(u8),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Field extraction failed: {0}")]
    Fields(#[from] FieldError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Outcome of one stage within a run.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub status: StageStatus,
    pub elapsed_ms: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Present only when the stage failed.
    pub error: Option<String>,
}

/// Summary of a full pipeline run, returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunReport {
    pub document_id: Uuid,
    pub requested_level: u8,
    pub stages: Vec<StageReport>,
    pub completed_stages: usize,
    pub failed_stages: usize,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    /// USD, from per-million token prices. Zero for local models.
    pub estimated_cost_usd: f64,
    pub document_type: Option<DocumentType>,
}

impl PipelineRunReport {
    pub fn succeeded(&self) -> bool {
        self.failed_stages == 0
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Per-million-token prices used for the cost estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPricing {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

pub struct DocumentPipeline {
    extractor: Box<dyn TextExtractor>,
    classifier: Classifier,
    field_extractor: FieldExtractor,
    chunker: DocumentChunker,
    blob_store: Arc<dyn BlobStore>,
    pricing: TokenPricing,
    running: Mutex<HashSet<Uuid>>,
}

impl DocumentPipeline {
    pub fn new(
        extractor: Box<dyn TextExtractor>,
        llm: Arc<dyn LlmClient>,
        blob_store: Arc<dyn BlobStore>,
        pricing: TokenPricing,
    ) -> Self {
        Self {
            extractor,
            classifier: Classifier::new(llm.clone()),
            field_extractor: FieldExtractor::new(llm),
            chunker: DocumentChunker::new(),
            blob_store,
            pricing,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Run the pipeline for a document up to `level` (1-4).
    ///
    /// Stages at or below the level are reset to pending first, then run
    /// in order. A stage failure marks that stage failed and aborts the
    /// rest of the run; earlier completed stages keep their outputs.
    ///
    /// The shared connection is locked only around repository calls, so
    /// other users of the connection are not stalled while a stage waits
    /// on the model.
    pub fn process_document(
        &self,
        conn: &Mutex<Connection>,
        document_id: &Uuid,
        level: u8,
    ) -> Result<PipelineRunReport, PipelineError> {
        if !(1..=4).contains(&level) {
            return Err(PipelineError::InvalidLevel(level));
        }

        let _guard = self.begin_run(*document_id)?;

        let mut document = {
            let conn = conn.lock().unwrap();
            let document = document_repo::get_document(&conn, document_id)?
                .ok_or(PipelineError::DocumentNotFound(*document_id))?;
            document_repo::reset_stages_up_to(&conn, document_id, level)?;
            document_repo::set_processing_level(&conn, document_id, level)?;
            document
        };

        tracing::info!(
            document_id = %document_id,
            level = level,
            filename = %document.original_filename,
            "Starting pipeline run"
        );

        for stage in PipelineStage::all() {
            if stage.level() <= level {
                document.set_stage_status(*stage, StageStatus::Pending);
            }
        }

        let mut report = PipelineRunReport {
            document_id: *document_id,
            requested_level: level,
            stages: Vec::new(),
            completed_stages: 0,
            failed_stages: 0,
            total_prompt_tokens: 0,
            total_completion_tokens: 0,
            estimated_cost_usd: 0.0,
            document_type: document.document_type,
        };

        for stage in PipelineStage::all() {
            if stage.level() > level {
                break;
            }

            document_repo::set_stage_status(
                &conn.lock().unwrap(),
                document_id,
                *stage,
                StageStatus::Running,
            )?;
            let started = Instant::now();
            let result = self.run_stage(conn, &mut document, *stage);
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok((prompt_tokens, completion_tokens)) => {
                    document_repo::set_stage_status(
                        &conn.lock().unwrap(),
                        document_id,
                        *stage,
                        StageStatus::Completed,
                    )?;
                    report.stages.push(StageReport {
                        stage: *stage,
                        status: StageStatus::Completed,
                        elapsed_ms,
                        prompt_tokens,
                        completion_tokens,
                        error: None,
                    });
                    report.completed_stages += 1;
                    report.total_prompt_tokens += prompt_tokens;
                    report.total_completion_tokens += completion_tokens;
                }
                Err(e) => {
                    tracing::error!(
                        document_id = %document_id,
                        stage = stage.as_str(),
                        error = %e,
                        "Pipeline stage failed"
                    );
                    document_repo::set_stage_status(
                        &conn.lock().unwrap(),
                        document_id,
                        *stage,
                        StageStatus::Failed,
                    )?;
                    report.stages.push(StageReport {
                        stage: *stage,
                        status: StageStatus::Failed,
                        elapsed_ms,
                        prompt_tokens: 0,
                        completion_tokens: 0,
                        error: Some(e.to_string()),
                    });
                    report.failed_stages += 1;
                    break;
                }
            }
        }

        report.document_type = document.document_type;
        report.estimated_cost_usd = self.estimate_cost(&report);

        tracing::info!(
            document_id = %document_id,
            completed = report.completed_stages,
            failed = report.failed_stages,
            tokens = report.total_prompt_tokens + report.total_completion_tokens,
            "Pipeline run finished"
        );

        Ok(report)
    }

    fn run_stage(
        &self,
        conn: &Mutex<Connection>,
        document: &mut Document,
        stage: PipelineStage,
    ) -> Result<(u64, u64), PipelineError> {
        match stage {
            PipelineStage::Extraction => self.run_extraction(conn, document),
            PipelineStage::Classification => self.run_classification(conn, document),
            PipelineStage::Metadata => self.run_metadata(conn, document),
            PipelineStage::Chunking => self.run_chunking(conn, document),
        }
    }

    fn run_extraction(
        &self,
        conn: &Mutex<Connection>,
        document: &mut Document,
    ) -> Result<(u64, u64), PipelineError> {
        let bytes = self.blob_store.fetch(&document.file_path)?;
        let extension = document.extension().unwrap_or_default();
        let outcome = self.extractor.extract(&bytes, &extension)?;

        let conn = conn.lock().unwrap();
        results_repo::save_extraction_result(
            &conn,
            &ExtractionRecord {
                document_id: document.id,
                method: outcome.method,
                text: outcome.text.clone(),
                char_count: outcome.text.chars().count(),
                page_count: outcome.page_count,
            },
        )?;
        document_repo::update_document_outputs(&conn, &document.id, Some(&outcome.text), None)?;
        document.extracted_text = Some(outcome.text);

        Ok((outcome.prompt_tokens, outcome.completion_tokens))
    }

    fn run_classification(
        &self,
        conn: &Mutex<Connection>,
        document: &mut Document,
    ) -> Result<(u64, u64), PipelineError> {
        let text = document.extracted_text.clone().unwrap_or_default();
        let classification =
            self.classifier
                .classify(&document.original_filename, &text, true)?;

        let conn = conn.lock().unwrap();
        results_repo::save_classification_result(
            &conn,
            &ClassificationRecord {
                document_id: document.id,
                document_type: classification.document_type,
                confidence: classification.confidence as f32,
                method: classification.method,
                reasoning: classification.reasoning.clone(),
                fallback_used: classification.fallback_used,
            },
        )?;
        document_repo::update_document_outputs(
            &conn,
            &document.id,
            None,
            Some(classification.document_type),
        )?;
        document.document_type = Some(classification.document_type);

        Ok((
            classification.prompt_tokens,
            classification.completion_tokens,
        ))
    }

    fn run_metadata(
        &self,
        conn: &Mutex<Connection>,
        document: &mut Document,
    ) -> Result<(u64, u64), PipelineError> {
        let document_type = document.document_type.unwrap_or(DocumentType::Unclassified);

        // Unclassified documents have no field schema; the stage completes
        // with nothing to extract rather than failing the run.
        if document_type == DocumentType::Unclassified {
            tracing::info!(
                document_id = %document.id,
                "Skipping field extraction for unclassified document"
            );
            return Ok((0, 0));
        }

        let template = {
            let conn = conn.lock().unwrap();
            FieldExtractor::active_template(&conn, document_type)?
        };

        let text = document.extracted_text.clone().unwrap_or_default();
        let extraction = self.field_extractor.extract(&template, &text)?;

        results_repo::save_extracted_fields(&conn.lock().unwrap(), &document.id, &extraction.fields)?;

        Ok((extraction.prompt_tokens, extraction.completion_tokens))
    }

    fn run_chunking(
        &self,
        conn: &Mutex<Connection>,
        document: &mut Document,
    ) -> Result<(u64, u64), PipelineError> {
        let text = document.extracted_text.clone().unwrap_or_default();
        let spans = self.chunker.chunk(&text);
        let chunks: Vec<DocumentChunk> = spans
            .into_iter()
            .map(|span| DocumentChunk {
                id: Uuid::new_v4(),
                document_id: document.id,
                chunk_index: span.chunk_index,
                content: span.content,
                char_offset: span.char_offset,
            })
            .collect();

        results_repo::replace_chunks(&conn.lock().unwrap(), &document.id, &chunks)?;
        Ok((0, 0))
    }

    fn estimate_cost(&self, report: &PipelineRunReport) -> f64 {
        report.total_prompt_tokens as f64 / 1_000_000.0 * self.pricing.prompt_per_million
            + report.total_completion_tokens as f64 / 1_000_000.0
                * self.pricing.completion_per_million
    }

    /// Claim the single-flight slot for a document.
    fn begin_run(&self, document_id: Uuid) -> Result<RunGuard<'_>, PipelineError> {
        let mut running = self.running.lock().unwrap();
        if !running.insert(document_id) {
            return Err(PipelineError::AlreadyRunning(document_id));
        }
        Ok(RunGuard {
            running: &self.running,
            document_id,
        })
    }
}

/// Releases the single-flight slot when the run ends, including on panic
/// or early return.
#[derive(Debug)]
struct RunGuard<'a> {
    running: &'a Mutex<HashSet<Uuid>>,
    document_id: Uuid,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.lock().unwrap().remove(&self.document_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::template::insert_template;
    use crate::db::sqlite::open_memory_database;
    use crate::llm::MockLlmClient;
    use crate::models::enums::ExtractionMethod;
    use crate::models::PromptTemplate;
    use crate::pipeline::extraction::types::ExtractionOutcome;
    use crate::storage::MemoryBlobStore;
    use chrono::Utc;

    struct StubExtractor(Result<String, ()>);
    impl TextExtractor for StubExtractor {
        fn extract(
            &self,
            _bytes: &[u8],
            _extension: &str,
        ) -> Result<ExtractionOutcome, ExtractionError> {
            match &self.0 {
                Ok(text) => Ok(ExtractionOutcome {
                    text: text.clone(),
                    method: ExtractionMethod::PdfDirect,
                    page_count: 2,
                    attempted: vec![ExtractionMethod::PdfDirect],
                    prompt_tokens: 0,
                    completion_tokens: 0,
                }),
                Err(()) => Err(ExtractionError::AllStrategiesFailed {
                    attempted: vec![
                        ExtractionMethod::PdfDirect,
                        ExtractionMethod::Ocr,
                        ExtractionMethod::AiVision,
                    ],
                }),
            }
        }
    }

    fn seed_document(conn: &Connection, filename: &str) -> Document {
        let now = Utc::now().naive_utc();
        let doc = Document {
            id: Uuid::new_v4(),
            community_id: None,
            file_path: "docs/test.pdf".into(),
            original_filename: filename.into(),
            content_hash: "abc123".into(),
            processing_level: 4,
            extraction_status: StageStatus::Pending,
            classification_status: StageStatus::Pending,
            metadata_status: StageStatus::Pending,
            chunking_status: StageStatus::Pending,
            extracted_text: None,
            document_type: None,
            created_at: now,
            updated_at: now,
        };
        document_repo::insert_document(conn, &doc).unwrap();
        doc
    }

    fn seed_invoice_template(conn: &Connection) {
        insert_template(
            conn,
            &PromptTemplate {
                id: Uuid::new_v4(),
                name: "invoice_fields".into(),
                version: 1,
                document_type: DocumentType::Invoice,
                body: "Extract fields from:\n{document_text}".into(),
                active: true,
                created_at: Utc::now().naive_utc(),
            },
        )
        .unwrap();
    }

    fn build_pipeline(llm: Arc<dyn LlmClient>) -> DocumentPipeline {
        let store = Arc::new(MemoryBlobStore::new().with_blob("docs/test.pdf", b"%PDF-1.7"));
        DocumentPipeline::new(
            Box::new(StubExtractor(Ok(
                "Factura numero 42. Total a pagar: 420,00 EUR. Servicio de limpieza.".into(),
            ))),
            llm,
            store,
            TokenPricing {
                prompt_per_million: 1.0,
                completion_per_million: 2.0,
            },
        )
    }

    #[test]
    fn full_run_completes_all_four_stages() {
        let conn = Mutex::new(open_memory_database().unwrap());
        seed_invoice_template(&conn.lock().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "Factura_Marzo.pdf");

        let llm = Arc::new(MockLlmClient::new(
            "{\"vendor\": \"Limpiezas Sol\", \"total_amount\": 420.0}",
        ));
        let pipeline = build_pipeline(llm.clone());

        let report = pipeline.process_document(&conn, &doc.id, 4).unwrap();

        assert!(report.succeeded());
        assert_eq!(report.completed_stages, 4);
        assert_eq!(report.document_type, Some(DocumentType::Invoice));
        // Filename rule classified; only the field extraction called the AI
        assert_eq!(llm.call_count(), 1);

        let conn = conn.lock().unwrap();
        let stored = document_repo::get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(stored.extraction_status, StageStatus::Completed);
        assert_eq!(stored.chunking_status, StageStatus::Completed);
        assert_eq!(stored.document_type, Some(DocumentType::Invoice));
        assert!(!results_repo::get_chunks(&conn, &doc.id).unwrap().is_empty());
        assert!(
            results_repo::get_extracted_fields(&conn, &doc.id, DocumentType::Invoice)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn extraction_record_carries_method_and_page_count() {
        let conn = Mutex::new(open_memory_database().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "Factura_Marzo.pdf");

        let pipeline = build_pipeline(Arc::new(MockLlmClient::new("{}")));
        pipeline.process_document(&conn, &doc.id, 1).unwrap();

        let record = results_repo::get_extraction_result(&conn.lock().unwrap(), &doc.id)
            .unwrap()
            .unwrap();
        assert_eq!(record.method, ExtractionMethod::PdfDirect);
        // The stub extractor reports a two-page document
        assert_eq!(record.page_count, 2);
    }

    #[test]
    fn classification_record_keeps_the_reasoning() {
        let conn = Mutex::new(open_memory_database().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "Factura_Marzo.pdf");

        let pipeline = build_pipeline(Arc::new(MockLlmClient::new("{}")));
        pipeline.process_document(&conn, &doc.id, 2).unwrap();

        let record = results_repo::get_classification_result(&conn.lock().unwrap(), &doc.id)
            .unwrap()
            .unwrap();
        assert_eq!(
            record.reasoning.as_deref(),
            Some("filename contains \"factura\"")
        );
    }

    #[test]
    fn token_usage_and_cost_are_reported() {
        let conn = Mutex::new(open_memory_database().unwrap());
        seed_invoice_template(&conn.lock().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "Factura_Marzo.pdf");

        let llm = Arc::new(
            MockLlmClient::new("{\"vendor\": \"Limpiezas Sol\"}").with_token_counts(1_000_000, 500_000),
        );
        let pipeline = build_pipeline(llm);

        let report = pipeline.process_document(&conn, &doc.id, 4).unwrap();
        assert_eq!(report.total_prompt_tokens, 1_000_000);
        assert_eq!(report.total_completion_tokens, 500_000);
        // 1.0 * 1M prompt + 2.0 * 0.5M completion
        assert!((report.estimated_cost_usd - 2.0).abs() < 1e-9);
    }

    #[test]
    fn level_limits_which_stages_run() {
        let conn = Mutex::new(open_memory_database().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "Factura_Marzo.pdf");

        let pipeline = build_pipeline(Arc::new(MockLlmClient::new("{}")));
        let report = pipeline.process_document(&conn, &doc.id, 2).unwrap();

        assert_eq!(report.completed_stages, 2);
        let stored = document_repo::get_document(&conn.lock().unwrap(), &doc.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.classification_status, StageStatus::Completed);
        assert_eq!(stored.metadata_status, StageStatus::Pending);
        assert_eq!(stored.chunking_status, StageStatus::Pending);
    }

    #[test]
    fn reprocess_resets_only_stages_at_or_below_level() {
        let conn = Mutex::new(open_memory_database().unwrap());
        seed_invoice_template(&conn.lock().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "Factura_Marzo.pdf");

        let pipeline = build_pipeline(Arc::new(MockLlmClient::new(
            "{\"vendor\": \"Limpiezas Sol\"}",
        )));
        pipeline.process_document(&conn, &doc.id, 4).unwrap();

        // Rerun at level 2: stages 3-4 keep their completed state
        pipeline.process_document(&conn, &doc.id, 2).unwrap();
        let stored = document_repo::get_document(&conn.lock().unwrap(), &doc.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.extraction_status, StageStatus::Completed);
        assert_eq!(stored.classification_status, StageStatus::Completed);
        assert_eq!(stored.metadata_status, StageStatus::Completed);
        assert_eq!(stored.chunking_status, StageStatus::Completed);
    }

    #[test]
    fn extraction_failure_stops_the_run() {
        let conn = Mutex::new(open_memory_database().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "scan.pdf");

        let store = Arc::new(MemoryBlobStore::new().with_blob("docs/test.pdf", b"%PDF-1.7"));
        let pipeline = DocumentPipeline::new(
            Box::new(StubExtractor(Err(()))),
            Arc::new(MockLlmClient::new("{}")),
            store,
            TokenPricing::default(),
        );

        let report = pipeline.process_document(&conn, &doc.id, 4).unwrap();
        assert_eq!(report.failed_stages, 1);
        assert_eq!(report.completed_stages, 0);
        assert_eq!(report.stages.len(), 1);
        assert!(report.stages[0].error.as_deref().unwrap().contains("pdf_direct"));

        let stored = document_repo::get_document(&conn.lock().unwrap(), &doc.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.extraction_status, StageStatus::Failed);
        assert_eq!(stored.classification_status, StageStatus::Pending);
    }

    #[test]
    fn unclassified_document_skips_field_extraction() {
        let conn = Mutex::new(open_memory_database().unwrap());
        let doc = seed_document(&conn.lock().unwrap(), "scan_0042.pdf");

        // AI returns an unusable label, so the document stays unclassified
        let llm = Arc::new(MockLlmClient::new("no idea"));
        let pipeline = build_pipeline(llm.clone());

        let report = pipeline.process_document(&conn, &doc.id, 4).unwrap();
        assert!(report.succeeded());
        assert_eq!(report.document_type, Some(DocumentType::Unclassified));
        // One classification call, no field extraction call
        assert_eq!(llm.call_count(), 1);
    }

    #[test]
    fn concurrent_run_for_same_document_is_rejected() {
        let pipeline = build_pipeline(Arc::new(MockLlmClient::new("{}")));
        let id = Uuid::new_v4();

        let guard = pipeline.begin_run(id).unwrap();
        let err = pipeline.begin_run(id).unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRunning(other) if other == id));

        drop(guard);
        pipeline.begin_run(id).unwrap();
    }

    #[test]
    fn invalid_level_is_rejected() {
        let conn = Mutex::new(open_memory_database().unwrap());
        let pipeline = build_pipeline(Arc::new(MockLlmClient::new("{}")));
        let err = pipeline
            .process_document(&conn, &Uuid::new_v4(), 0)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLevel(0)));
    }

    #[test]
    fn missing_document_is_reported() {
        let conn = Mutex::new(open_memory_database().unwrap());
        let pipeline = build_pipeline(Arc::new(MockLlmClient::new("{}")));
        let err = pipeline
            .process_document(&conn, &Uuid::new_v4(), 4)
            .unwrap_err();
        assert!(matches!(err, PipelineError::DocumentNotFound(_)));
    }

    /// Model call that parks until released, signalling when it is entered.
    struct GatedLlm {
        entered: std::sync::mpsc::Sender<()>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl LlmClient for GatedLlm {
        fn generate(
            &self,
            _prompt: &str,
            _system: &str,
        ) -> Result<crate::llm::LlmResponse, crate::llm::LlmError> {
            self.entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(crate::llm::LlmResponse {
                text: "invoice".into(),
                prompt_tokens: 1,
                completion_tokens: 1,
            })
        }

        fn generate_with_images(
            &self,
            _prompt: &str,
            _images_base64: &[String],
        ) -> Result<crate::llm::LlmResponse, crate::llm::LlmError> {
            Err(crate::llm::LlmError::Connection("not used".into()))
        }
    }

    #[test]
    fn connection_stays_available_during_model_calls() {
        let conn = Arc::new(Mutex::new(open_memory_database().unwrap()));
        // No filename keyword, so classification goes to the model
        let doc = seed_document(&conn.lock().unwrap(), "scan_0042.pdf");
        let doc_id = doc.id;

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let pipeline = Arc::new(build_pipeline(Arc::new(GatedLlm {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        })));

        let worker = {
            let conn = conn.clone();
            let pipeline = pipeline.clone();
            std::thread::spawn(move || pipeline.process_document(&conn, &doc_id, 2))
        };

        // The run is parked inside the model call; the connection must be
        // free for other requests.
        entered_rx.recv().unwrap();
        let stored = document_repo::get_document(&conn.lock().unwrap(), &doc_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.classification_status, StageStatus::Running);

        release_tx.send(()).unwrap();
        let report = worker.join().unwrap().unwrap();
        assert_eq!(report.completed_stages, 2);
        assert_eq!(report.document_type, Some(DocumentType::Invoice));
    }
}
