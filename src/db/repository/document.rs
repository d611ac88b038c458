use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{DocumentType, PipelineStage, StageStatus};
use crate::models::Document;

const DOCUMENT_COLUMNS: &str = "id, community_id, file_path, original_filename, content_hash,
     processing_level, extraction_status, classification_status, metadata_status, chunking_status,
     extracted_text, type, created_at, updated_at";

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, community_id, file_path, original_filename, content_hash,
         processing_level, extraction_status, classification_status, metadata_status, chunking_status,
         extracted_text, type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            doc.id.to_string(),
            doc.community_id.map(|id| id.to_string()),
            doc.file_path,
            doc.original_filename,
            doc.content_hash,
            doc.processing_level,
            doc.extraction_status.as_str(),
            doc.classification_status.as_str(),
            doc.metadata_status.as_str(),
            doc.chunking_status.as_str(),
            doc.extracted_text,
            doc.document_type.map(|t| t.as_str()),
            format_datetime(&doc.created_at),
            format_datetime(&doc.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], map_document_row);

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_document_by_hash(
    conn: &Connection,
    content_hash: &str,
) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE content_hash = ?1 LIMIT 1"
    ))?;

    let result = stmt.query_row(params![content_hash], map_document_row);

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_documents(
    conn: &Connection,
    community_id: Option<&Uuid>,
) -> Result<Vec<Document>, DatabaseError> {
    let (sql, param): (String, Option<String>) = match community_id {
        Some(id) => (
            format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE community_id = ?1
                 ORDER BY created_at DESC"
            ),
            Some(id.to_string()),
        ),
        None => (
            format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC"),
            None,
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let mut docs = Vec::new();
    match param {
        Some(p) => {
            let rows = stmt.query_map(params![p], map_document_row)?;
            for row in rows {
                docs.push(document_from_row(row?)?);
            }
        }
        None => {
            let rows = stmt.query_map([], map_document_row)?;
            for row in rows {
                docs.push(document_from_row(row?)?);
            }
        }
    }
    Ok(docs)
}

/// Write the extracted text and (optionally) classified type back to the
/// document row.
pub fn update_document_outputs(
    conn: &Connection,
    document_id: &Uuid,
    extracted_text: Option<&str>,
    document_type: Option<DocumentType>,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET
             extracted_text = COALESCE(?2, extracted_text),
             type = COALESCE(?3, type),
             updated_at = ?4
         WHERE id = ?1",
        params![
            document_id.to_string(),
            extracted_text,
            document_type.map(|t| t.as_str()),
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: document_id.to_string(),
        });
    }
    Ok(())
}

/// Record the level the latest pipeline run was requested at.
pub fn set_processing_level(
    conn: &Connection,
    document_id: &Uuid,
    level: u8,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET processing_level = ?2, updated_at = ?3 WHERE id = ?1",
        params![
            document_id.to_string(),
            level as i64,
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Document".into(),
            id: document_id.to_string(),
        });
    }
    Ok(())
}

/// Update one stage status, validating the allowed-transition table.
///
/// Statuses only move forward within a run; the edge back to Pending is
/// reserved for `reset_stages_up_to`.
pub fn set_stage_status(
    conn: &Connection,
    document_id: &Uuid,
    stage: PipelineStage,
    status: StageStatus,
) -> Result<(), DatabaseError> {
    let current = get_stage_status(conn, document_id, stage)?;
    if !current.can_transition_to(status) {
        return Err(DatabaseError::InvalidTransition {
            stage: stage.as_str().into(),
            from: current.as_str().into(),
            to: status.as_str().into(),
        });
    }

    conn.execute(
        &format!(
            "UPDATE documents SET {} = ?2, updated_at = ?3 WHERE id = ?1",
            stage_column(stage)
        ),
        params![
            document_id.to_string(),
            status.as_str(),
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    Ok(())
}

/// Reset the statuses of all stages with level <= `level` back to Pending.
/// Stages above the level are left untouched (reprocess semantics).
pub fn reset_stages_up_to(
    conn: &Connection,
    document_id: &Uuid,
    level: u8,
) -> Result<(), DatabaseError> {
    for stage in PipelineStage::all() {
        if stage.level() <= level {
            conn.execute(
                &format!(
                    "UPDATE documents SET {} = 'pending', updated_at = ?2 WHERE id = ?1",
                    stage_column(*stage)
                ),
                params![
                    document_id.to_string(),
                    format_datetime(&Utc::now().naive_utc()),
                ],
            )?;
        }
    }
    Ok(())
}

fn get_stage_status(
    conn: &Connection,
    document_id: &Uuid,
    stage: PipelineStage,
) -> Result<StageStatus, DatabaseError> {
    let raw: String = conn
        .query_row(
            &format!(
                "SELECT {} FROM documents WHERE id = ?1",
                stage_column(stage)
            ),
            params![document_id.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
                entity_type: "Document".into(),
                id: document_id.to_string(),
            },
            other => other.into(),
        })?;
    StageStatus::from_str(&raw)
}

fn stage_column(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Extraction => "extraction_status",
        PipelineStage::Classification => "classification_status",
        PipelineStage::Metadata => "metadata_status",
        PipelineStage::Chunking => "chunking_status",
    }
}

pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(crate) fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .unwrap_or_default()
}

// Internal row type for Document mapping
struct DocumentRow {
    id: String,
    community_id: Option<String>,
    file_path: String,
    original_filename: String,
    content_hash: String,
    processing_level: u8,
    extraction_status: String,
    classification_status: String,
    metadata_status: String,
    chunking_status: String,
    extracted_text: Option<String>,
    document_type: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        community_id: row.get(1)?,
        file_path: row.get(2)?,
        original_filename: row.get(3)?,
        content_hash: row.get(4)?,
        processing_level: row.get(5)?,
        extraction_status: row.get(6)?,
        classification_status: row.get(7)?,
        metadata_status: row.get(8)?,
        chunking_status: row.get(9)?,
        extracted_text: row.get(10)?,
        document_type: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        community_id: row.community_id.and_then(|s| Uuid::parse_str(&s).ok()),
        file_path: row.file_path,
        original_filename: row.original_filename,
        content_hash: row.content_hash,
        processing_level: row.processing_level,
        extraction_status: StageStatus::from_str(&row.extraction_status)?,
        classification_status: StageStatus::from_str(&row.classification_status)?,
        metadata_status: StageStatus::from_str(&row.metadata_status)?,
        chunking_status: StageStatus::from_str(&row.chunking_status)?,
        extracted_text: row.extracted_text,
        document_type: row
            .document_type
            .as_deref()
            .map(DocumentType::from_str)
            .transpose()?,
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    pub(crate) fn sample_document() -> Document {
        let now = Utc::now().naive_utc();
        Document {
            id: Uuid::new_v4(),
            community_id: None,
            file_path: "blobs/factura-2026-03.pdf".into(),
            original_filename: "factura-2026-03.pdf".into(),
            content_hash: "00".repeat(32),
            processing_level: 4,
            extraction_status: StageStatus::Pending,
            classification_status: StageStatus::Pending,
            metadata_status: StageStatus::Pending,
            chunking_status: StageStatus::Pending,
            extracted_text: None,
            document_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let doc = sample_document();
        insert_document(&conn, &doc).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.original_filename, doc.original_filename);
        assert_eq!(loaded.extraction_status, StageStatus::Pending);
        assert_eq!(loaded.document_type, None);
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_document(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn lookup_by_content_hash() {
        let conn = open_memory_database().unwrap();
        let doc = sample_document();
        insert_document(&conn, &doc).unwrap();

        let found = get_document_by_hash(&conn, &doc.content_hash).unwrap();
        assert_eq!(found.unwrap().id, doc.id);
        assert!(get_document_by_hash(&conn, "deadbeef").unwrap().is_none());
    }

    #[test]
    fn valid_stage_transitions_persist() {
        let conn = open_memory_database().unwrap();
        let doc = sample_document();
        insert_document(&conn, &doc).unwrap();

        set_stage_status(&conn, &doc.id, PipelineStage::Extraction, StageStatus::Running).unwrap();
        set_stage_status(
            &conn,
            &doc.id,
            PipelineStage::Extraction,
            StageStatus::Completed,
        )
        .unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.extraction_status, StageStatus::Completed);
    }

    #[test]
    fn illegal_transition_rejected() {
        let conn = open_memory_database().unwrap();
        let doc = sample_document();
        insert_document(&conn, &doc).unwrap();

        // pending -> completed skips running
        let err = set_stage_status(
            &conn,
            &doc.id,
            PipelineStage::Extraction,
            StageStatus::Completed,
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidTransition { .. }));
    }

    #[test]
    fn reset_touches_only_stages_up_to_level() {
        let conn = open_memory_database().unwrap();
        let mut doc = sample_document();
        doc.extraction_status = StageStatus::Completed;
        doc.classification_status = StageStatus::Failed;
        doc.metadata_status = StageStatus::Completed;
        doc.chunking_status = StageStatus::Completed;
        insert_document(&conn, &doc).unwrap();

        reset_stages_up_to(&conn, &doc.id, 2).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.extraction_status, StageStatus::Pending);
        assert_eq!(loaded.classification_status, StageStatus::Pending);
        assert_eq!(loaded.metadata_status, StageStatus::Completed);
        assert_eq!(loaded.chunking_status, StageStatus::Completed);
    }

    #[test]
    fn update_outputs_writes_text_and_type() {
        let conn = open_memory_database().unwrap();
        let doc = sample_document();
        insert_document(&conn, &doc).unwrap();

        update_document_outputs(&conn, &doc.id, Some("Importe total: 423,50 EUR"), None).unwrap();
        update_document_outputs(&conn, &doc.id, None, Some(DocumentType::Invoice)).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(
            loaded.extracted_text.as_deref(),
            Some("Importe total: 423,50 EUR")
        );
        assert_eq!(loaded.document_type, Some(DocumentType::Invoice));
    }

    #[test]
    fn update_outputs_missing_document_errors() {
        let conn = open_memory_database().unwrap();
        let err = update_document_outputs(&conn, &Uuid::new_v4(), Some("x"), None).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
