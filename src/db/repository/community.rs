use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::document::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::Community;

pub fn insert_community(conn: &Connection, community: &Community) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO communities (id, name, address, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            community.id.to_string(),
            community.name,
            community.address,
            format_datetime(&community.created_at),
            format_datetime(&community.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_community(conn: &Connection, id: &Uuid) -> Result<Option<Community>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, address, created_at, updated_at FROM communities WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );

    match result {
        Ok((id, name, address, created_at, updated_at)) => Ok(Some(Community {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            name,
            address,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_communities(conn: &Connection) -> Result<Vec<Community>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, address, created_at, updated_at FROM communities ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut communities = Vec::new();
    for row in rows {
        let (id, name, address, created_at, updated_at) = row?;
        communities.push(Community {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            name,
            address,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        });
    }
    Ok(communities)
}

pub fn update_community(
    conn: &Connection,
    id: &Uuid,
    name: &str,
    address: Option<&str>,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE communities SET name = ?2, address = ?3, updated_at = ?4 WHERE id = ?1",
        params![
            id.to_string(),
            name,
            address,
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Community".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_community(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM communities WHERE id = ?1",
        params![id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Community".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
