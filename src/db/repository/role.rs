use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::document::format_datetime;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::RoleGrant;

pub fn insert_role_grant(conn: &Connection, grant: &RoleGrant) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO role_grants (id, user_id, community_id, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            grant.id.to_string(),
            grant.user_id,
            grant.community_id.map(|id| id.to_string()),
            grant.role.as_str(),
            format_datetime(&Utc::now().naive_utc()),
        ],
    )?;
    Ok(())
}

/// All grants held by a user. The permission predicate is recomputed from
/// this row-set on every call; there is no caching layer.
pub fn grants_for_user(conn: &Connection, user_id: &str) -> Result<Vec<RoleGrant>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, community_id, role FROM role_grants WHERE user_id = ?1",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut grants = Vec::new();
    for row in rows {
        let (id, user_id, community_id, role) = row?;
        grants.push(RoleGrant {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            user_id,
            community_id: community_id.and_then(|s| Uuid::parse_str(&s).ok()),
            role: Role::from_str(&role)?,
        });
    }
    Ok(grants)
}

pub fn delete_role_grant(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM role_grants WHERE id = ?1",
        params![id.to_string()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "RoleGrant".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn grants_round_trip() {
        let conn = open_memory_database().unwrap();
        let grant = RoleGrant {
            id: Uuid::new_v4(),
            user_id: "user-7".into(),
            community_id: None,
            role: Role::Admin,
        };
        insert_role_grant(&conn, &grant).unwrap();

        let grants = grants_for_user(&conn, "user-7").unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].role, Role::Admin);
        assert_eq!(grants[0].community_id, None);

        assert!(grants_for_user(&conn, "stranger").unwrap().is_empty());
    }

    #[test]
    fn delete_missing_grant_errors() {
        let conn = open_memory_database().unwrap();
        let err = delete_role_grant(&conn, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
