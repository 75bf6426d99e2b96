//! Document upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::detect_file;
use crate::processing::{IngestJob, JobQueue};
use crate::server::state::AppState;
use crate::storage::ChatDb;
use crate::types::{parse_session_id, Document, DocumentStatus, UploadResponse};

/// A file part of the upload form
struct UploadedFile {
    filename: Option<String>,
    data: Bytes,
}

/// POST /upload_document - Register a URL or file and queue it for ingestion
///
/// Multipart fields: `session_id` (required), `url`, `file`. When both `url`
/// and `file` are present the URL is used.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut session_id: Option<String> = None;
    let mut url: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "session_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::bad_request(format!("Failed to read session_id: {}", e)))?;
                session_id = Some(value);
            }
            "url" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::bad_request(format!("Failed to read url: {}", e)))?;
                let value = value.trim().to_string();
                if !value.is_empty() {
                    url = Some(value);
                }
            }
            "file" => {
                let filename = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::bad_request(format!("Failed to read file: {}", e)))?;
                file = Some(UploadedFile { filename, data });
            }
            other => {
                tracing::debug!("Ignoring unknown multipart field '{}'", other);
            }
        }
    }

    let session_id = session_id
        .ok_or_else(|| Error::bad_request("session_id is required"))
        .and_then(|raw| parse_session_id(&raw))?;

    let document = match (url, file) {
        (Some(url), _) => Document::from_url(session_id, url),
        (None, Some(file)) => store_file(&state, session_id, file).await?,
        (None, None) => return Err(Error::bad_request("Either URL or file must be provided")),
    };

    let job_id = enqueue(state.db(), state.job_queue(), &document).await?;

    tracing::info!(
        "Queued document {} ({}) for session {} as job {}",
        document.id,
        document.name,
        session_id,
        job_id
    );

    Ok(Json(UploadResponse {
        message: "Document upload initiated".to_string(),
        document_id: document.id,
        job_id,
    }))
}

/// Record the document and queue its ingestion
///
/// A document that cannot be queued is marked failed rather than left pending.
async fn enqueue(db: &ChatDb, job_queue: &JobQueue, document: &Document) -> Result<Uuid> {
    db.insert_document(document)?;
    match job_queue
        .submit(IngestJob::new(document.id, document.session_id))
        .await
    {
        Ok(job_id) => Ok(job_id),
        Err(e) => {
            tracing::error!("Could not queue document {}: {}", document.id, e);
            db.update_document_status(&document.id, DocumentStatus::Failed, Some(&e.to_string()))?;
            Err(e)
        }
    }
}

async fn store_file(state: &AppState, session_id: Uuid, file: UploadedFile) -> Result<Document> {
    let filename = file
        .filename
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::bad_request("Uploaded file must have a filename"))?;

    let document_id = Uuid::new_v4();
    let path = state
        .document_store()
        .store_upload(&document_id, &filename, &file.data)
        .await?;
    let path = path.to_string_lossy().into_owned();

    tracing::debug!("Stored upload {} ({} bytes) at {}", filename, file.data.len(), path);

    Ok(Document::from_upload(
        document_id,
        session_id,
        filename.as_str(),
        detect_file(&path),
        path,
    ))
}
