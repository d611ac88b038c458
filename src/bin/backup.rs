//! Offline backup dump.
//!
//! Reads the service database and writes a JSON snapshot of communities,
//! documents, and role grants to a timestamped file (override the path with
//! `COMUNIA_BACKUP_OUT`). Blobs are not included; they are content-addressed
//! and backed up separately.

use comunia::config::Config;
use comunia::db::repository::{community, document, role};
use comunia::db::sqlite::open_database;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    comunia::init_tracing();
    let cfg = Config::from_env();

    let conn = open_database(&cfg.db_path)?;

    let communities = community::list_communities(&conn)?;
    let documents = document::list_documents(&conn, None)?;

    let mut grants = Vec::new();
    {
        let mut stmt = conn.prepare("SELECT DISTINCT user_id FROM role_grants")?;
        let users: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;
        for user in users {
            grants.extend(role::grants_for_user(&conn, &user)?);
        }
    }

    let snapshot = serde_json::json!({
        "taken_at": chrono::Utc::now().to_rfc3339(),
        "communities": communities,
        "documents": documents,
        "role_grants": grants,
    });
    let payload = serde_json::to_string_pretty(&snapshot)?;

    let path = match std::env::var("COMUNIA_BACKUP_OUT") {
        Ok(path) if !path.is_empty() => path,
        _ => format!(
            "comunia-backup-{}.json",
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        ),
    };
    std::fs::write(&path, payload)?;
    tracing::info!(
        path = %path,
        communities = communities.len(),
        documents = documents.len(),
        grants = grants.len(),
        "Backup written"
    );
    Ok(())
}
