use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::document::format_datetime;
use crate::db::DatabaseError;
use crate::models::enums::{ClassificationMethod, DocumentType, ExtractionMethod};
use crate::models::{ClassificationRecord, DocumentChunk, ExtractedFields, ExtractionRecord};

/// Upsert the extraction result for a document. Reprocessing overwrites.
pub fn save_extraction_result(
    conn: &Connection,
    record: &ExtractionRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO extraction_results (document_id, method, text, char_count, page_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(document_id) DO UPDATE SET
             method = excluded.method,
             text = excluded.text,
             char_count = excluded.char_count,
             page_count = excluded.page_count,
             created_at = excluded.created_at",
        params![
            record.document_id.to_string(),
            record.method.as_str(),
            record.text,
            record.char_count as i64,
            record.page_count as i64,
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    Ok(())
}

pub fn get_extraction_result(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<ExtractionRecord>, DatabaseError> {
    let result = conn.query_row(
        "SELECT method, text, char_count, page_count
         FROM extraction_results WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        },
    );

    match result {
        Ok((method, text, char_count, page_count)) => Ok(Some(ExtractionRecord {
            document_id: *document_id,
            method: ExtractionMethod::from_str(&method)?,
            text,
            char_count: char_count as usize,
            page_count: page_count as usize,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_classification_result(
    conn: &Connection,
    record: &ClassificationRecord,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO classification_results
             (document_id, document_type, confidence, method, reasoning, fallback_used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(document_id) DO UPDATE SET
             document_type = excluded.document_type,
             confidence = excluded.confidence,
             method = excluded.method,
             reasoning = excluded.reasoning,
             fallback_used = excluded.fallback_used,
             created_at = excluded.created_at",
        params![
            record.document_id.to_string(),
            record.document_type.as_str(),
            record.confidence,
            record.method.as_str(),
            record.reasoning,
            record.fallback_used as i32,
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    Ok(())
}

pub fn get_classification_result(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<ClassificationRecord>, DatabaseError> {
    let result = conn.query_row(
        "SELECT document_type, confidence, method, reasoning, fallback_used
         FROM classification_results WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i32>(4)?,
            ))
        },
    );

    match result {
        Ok((ty, confidence, method, reasoning, fallback)) => Ok(Some(ClassificationRecord {
            document_id: *document_id,
            document_type: DocumentType::from_str(&ty)?,
            confidence,
            method: ClassificationMethod::from_str(&method)?,
            reasoning,
            fallback_used: fallback != 0,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Upsert the extracted business fields, keyed by document id + type.
pub fn save_extracted_fields(
    conn: &Connection,
    document_id: &Uuid,
    fields: &ExtractedFields,
) -> Result<(), DatabaseError> {
    let json = serde_json::to_string(fields)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
    conn.execute(
        "INSERT INTO extracted_fields (document_id, document_type, fields_json, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(document_id, document_type) DO UPDATE SET
             fields_json = excluded.fields_json,
             created_at = excluded.created_at",
        params![
            document_id.to_string(),
            fields.document_type().as_str(),
            json,
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    Ok(())
}

pub fn get_extracted_fields(
    conn: &Connection,
    document_id: &Uuid,
    document_type: DocumentType,
) -> Result<Option<ExtractedFields>, DatabaseError> {
    let result = conn.query_row(
        "SELECT fields_json FROM extracted_fields
         WHERE document_id = ?1 AND document_type = ?2",
        params![document_id.to_string(), document_type.as_str()],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(json) => {
            let fields = serde_json::from_str(&json)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
            Ok(Some(fields))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace all chunks of a document with a fresh set.
pub fn replace_chunks(
    conn: &Connection,
    document_id: &Uuid,
    chunks: &[DocumentChunk],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM document_chunks WHERE document_id = ?1",
        params![document_id.to_string()],
    )?;
    let now = format_datetime(&Utc::now().naive_utc());
    for chunk in chunks {
        conn.execute(
            "INSERT INTO document_chunks (id, document_id, chunk_index, content, char_offset, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chunk.id.to_string(),
                chunk.document_id.to_string(),
                chunk.chunk_index as i64,
                chunk.content,
                chunk.char_offset as i64,
                now,
            ],
        )?;
    }
    Ok(())
}

pub fn get_chunks(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<DocumentChunk>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, chunk_index, content, char_offset
         FROM document_chunks WHERE document_id = ?1 ORDER BY chunk_index",
    )?;
    let rows = stmt.query_map(params![document_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut chunks = Vec::new();
    for row in rows {
        let (id, index, content, offset) = row?;
        chunks.push(DocumentChunk {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            document_id: *document_id,
            chunk_index: index as usize,
            content,
            char_offset: offset as usize,
        });
    }
    Ok(chunks)
}
