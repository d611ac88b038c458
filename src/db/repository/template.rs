use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::document::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::enums::DocumentType;
use crate::models::PromptTemplate;

pub fn insert_template(conn: &Connection, template: &PromptTemplate) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prompt_templates (id, name, version, document_type, body, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            template.id.to_string(),
            template.name,
            template.version,
            template.document_type.as_str(),
            template.body,
            template.active as i32,
            format_datetime(&template.created_at),
        ],
    )?;
    Ok(())
}

/// Fetch the active template for a document type, if any.
pub fn get_active_template_for_type(
    conn: &Connection,
    document_type: DocumentType,
) -> Result<Option<PromptTemplate>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, version, document_type, body, active, created_at
         FROM prompt_templates WHERE document_type = ?1 AND active = 1 LIMIT 1",
        params![document_type.as_str()],
        map_template_row,
    );

    match result {
        Ok(row) => Ok(Some(template_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Fetch the active template by name, if any.
pub fn get_active_template_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<PromptTemplate>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, version, document_type, body, active, created_at
         FROM prompt_templates WHERE name = ?1 AND active = 1",
        params![name],
        map_template_row,
    );

    match result {
        Ok(row) => Ok(Some(template_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Activate one version of a named template, deactivating any other.
/// Runs in a transaction so the partial unique index never sees two
/// active rows.
pub fn activate_template(
    conn: &Connection,
    name: &str,
    version: i64,
) -> Result<(), DatabaseError> {
    conn.execute_batch("BEGIN")?;
    let result = (|| -> Result<(), DatabaseError> {
        conn.execute(
            "UPDATE prompt_templates SET active = 0 WHERE name = ?1",
            params![name],
        )?;
        let rows = conn.execute(
            "UPDATE prompt_templates SET active = 1 WHERE name = ?1 AND version = ?2",
            params![name, version],
        )?;
        if rows == 0 {
            return Err(DatabaseError::NotFound {
                entity_type: "PromptTemplate".into(),
                id: format!("{name} v{version}"),
            });
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

struct TemplateRow {
    id: String,
    name: String,
    version: i64,
    document_type: String,
    body: String,
    active: i32,
    created_at: String,
}

fn map_template_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok(TemplateRow {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        document_type: row.get(3)?,
        body: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn template_from_row(row: TemplateRow) -> Result<PromptTemplate, DatabaseError> {
    Ok(PromptTemplate {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        name: row.name,
        version: row.version,
        document_type: DocumentType::from_str(&row.document_type)?,
        body: row.body,
        active: row.active != 0,
        created_at: parse_datetime(&row.created_at),
    })
}
