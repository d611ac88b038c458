//! Document endpoints: upload, listing, download, pipeline runs.

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::ApiContext;
use crate::auth::permissions::require_role;
use crate::db::repository::document as document_repo;
use crate::events::Event;
use crate::models::enums::{Role, StageStatus};
use crate::models::Document;
use crate::pipeline::PipelineRunReport;
use crate::storage::content_hash;

/// Maximum upload size (20 MB).
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Cached downloads are content-addressed, so a year is safe.
const DOWNLOAD_CACHE_CONTROL: &str = "private, max-age=31536000, immutable";

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// `POST /api/documents/upload` — multipart upload.
///
/// Fields: `file` (required), `community_id` (optional). Content already
/// in the store is rejected with a conflict; blobs are content-addressed,
/// so the check is service-wide.
pub async fn upload(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Document>, ApiError> {
    let user_id = ctx.current_user(&headers)?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename = String::new();
    let mut community_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| ApiError::BadRequest("File field needs a filename".into()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::BadRequest(format!(
                        "File exceeds {} MB limit",
                        MAX_UPLOAD_BYTES / (1024 * 1024)
                    )));
                }
                file_bytes = Some(bytes.to_vec());
            }
            Some("community_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                community_id = Some(
                    Uuid::parse_str(text.trim())
                        .map_err(|_| ApiError::BadRequest("Invalid community_id".into()))?,
                );
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or_else(|| ApiError::BadRequest("Missing file field".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Empty file".into()));
    }

    let document = {
        let conn = ctx.conn.lock().unwrap();
        require_role(&conn, &user_id, Role::Manager, community_id.as_ref())?;

        let hash = content_hash(&bytes);
        if let Some(existing) = document_repo::get_document_by_hash(&conn, &hash)? {
            return Err(ApiError::Conflict(format!(
                "Identical content already uploaded as document {}",
                existing.id
            )));
        }

        let id = Uuid::new_v4();
        let blob_path = format!("docs/{id}/{filename}");
        ctx.blob_store.store(&blob_path, &bytes)?;

        let now = Utc::now().naive_utc();
        let document = Document {
            id,
            community_id,
            file_path: blob_path,
            original_filename: filename,
            content_hash: hash,
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
        document_repo::insert_document(&conn, &document)?;
        document
    };

    tracing::info!(
        document_id = %document.id,
        filename = %document.original_filename,
        size = bytes.len(),
        "Document uploaded"
    );
    ctx.events.publish(Event::DocumentChanged {
        document_id: document.id,
    });
    Ok(Json(document))
}

// ---------------------------------------------------------------------------
// Listing and detail
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListParams {
    pub community_id: Option<Uuid>,
}

/// `GET /api/documents?community_id=...`
pub async fn list(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let user_id = ctx.current_user(&headers)?;
    let conn = ctx.conn.lock().unwrap();

    require_role(&conn, &user_id, Role::Resident, params.community_id.as_ref())?;
    let documents = document_repo::list_documents(&conn, params.community_id.as_ref())?;
    Ok(Json(documents))
}

/// `GET /api/documents/:id`
pub async fn get(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let user_id = ctx.current_user(&headers)?;
    let conn = ctx.conn.lock().unwrap();

    let document = document_repo::get_document(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Document {id}")))?;
    require_role(&conn, &user_id, Role::Resident, document.community_id.as_ref())?;
    Ok(Json(document))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct DownloadParams {
    pub view: Option<String>,
}

/// `GET /documents/:id/download?view=inline`
///
/// Serves the original binary. `view=inline` renders in the browser,
/// anything else downloads as an attachment. The content hash doubles as
/// a strong ETag; a matching `If-None-Match` short-circuits to 304.
pub async fn download(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let user_id = ctx.current_user(&headers)?;

    let document = {
        let conn = ctx.conn.lock().unwrap();
        let document = document_repo::get_document(&conn, &id)?
            .ok_or_else(|| ApiError::NotFound(format!("Document {id}")))?;
        require_role(&conn, &user_id, Role::Resident, document.community_id.as_ref())?;
        document
    };

    let etag = format!("\"{}\"", document.content_hash);
    if let Some(candidate) = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        if candidate == etag {
            return Ok((
                StatusCode::NOT_MODIFIED,
                [
                    (header::ETAG, etag),
                    (header::CACHE_CONTROL, DOWNLOAD_CACHE_CONTROL.to_string()),
                ],
            )
                .into_response());
        }
    }

    let bytes = ctx.blob_store.fetch(&document.file_path)?;

    let mime = mime_guess::from_path(&document.original_filename)
        .first_or_octet_stream()
        .to_string();
    let inline = params.view.as_deref() == Some("inline");
    let disposition = if inline {
        format!("inline; filename=\"{}\"", document.original_filename)
    } else {
        format!("attachment; filename=\"{}\"", document.original_filename)
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_DISPOSITION, disposition),
            (header::ETAG, etag),
            (header::CACHE_CONTROL, DOWNLOAD_CACHE_CONTROL.to_string()),
        ],
        Body::from(bytes),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Pipeline runs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProcessPayload {
    /// Target processing level 1-4; defaults to the full pipeline.
    pub level: Option<u8>,
}

/// `POST /api/documents/:id/process` — run the pipeline, blocking until
/// the run finishes. Concurrent runs for the same document conflict.
pub async fn process(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProcessPayload>,
) -> Result<Json<PipelineRunReport>, ApiError> {
    let user_id = ctx.current_user(&headers)?;
    let level = payload.level.unwrap_or(4);

    {
        let conn = ctx.conn.lock().unwrap();
        let document = document_repo::get_document(&conn, &id)?
            .ok_or_else(|| ApiError::NotFound(format!("Document {id}")))?;
        require_role(&conn, &user_id, Role::Manager, document.community_id.as_ref())?;
    }

    // The pipeline makes blocking model calls; keep it off the runtime.
    // It locks the shared connection per repository call, so other
    // handlers are not stalled while a run waits on the model.
    let pipeline = ctx.pipeline.clone();
    let conn = ctx.conn.clone();
    let report = tokio::task::spawn_blocking(move || pipeline.process_document(&conn, &id, level))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    ctx.events.publish(Event::DocumentChanged { document_id: id });
    Ok(Json(report))
}
