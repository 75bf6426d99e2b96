//! Document management endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{
    parse_id, parse_session_id, DeleteDocumentParams, Document, MessageResponse, SessionFilter,
};

/// GET /documents?session_id= - Documents of a session
pub async fn list_documents(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Vec<Document>>> {
    let session_id = parse_session_id(&filter.session_id)?;
    Ok(Json(state.db().documents_for_session(&session_id)?))
}

/// GET /documents/:id - One document, for status polling
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>> {
    let document_id = parse_id("document_id", &id)?;
    state
        .db()
        .get_document(&document_id)?
        .map(Json)
        .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))
}

/// DELETE /documents/:id?session_id= - Delete a document's vectors, row and file
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DeleteDocumentParams>,
) -> Result<Json<MessageResponse>> {
    let document_id = parse_id("document_id", &id)?;
    let document = state
        .db()
        .get_document(&document_id)?
        .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;

    let session_id = match params.session_id.as_deref() {
        Some(raw) => parse_session_id(raw)?,
        None => document.session_id,
    };
    if session_id != document.session_id {
        return Err(Error::DocumentNotFound(document_id.to_string()));
    }

    state.db().delete_document(&document_id)?;
    let removed = state.purge_document(&session_id, &document).await?;

    tracing::info!("Deleted document {} ({} vectors)", document_id, removed);

    Ok(Json(MessageResponse::new(format!(
        "Document {} deleted successfully",
        document_id
    ))))
}
