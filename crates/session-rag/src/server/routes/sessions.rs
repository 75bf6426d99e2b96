//! Chat session endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{collection_name, parse_session_id, ChatMessage, ChatSession, MessageResponse};

/// GET /chat_sessions - All sessions, most recently active first
pub async fn list_sessions(State(state): State<AppState>) -> Result<Json<Vec<ChatSession>>> {
    Ok(Json(state.db().list_sessions()?))
}

/// GET /chat_sessions/:id/messages - Session history in timestamp order
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>> {
    let session_id = parse_session_id(&id)?;
    if state.db().get_session(&session_id)?.is_none() {
        return Err(Error::SessionNotFound(session_id.to_string()));
    }
    Ok(Json(state.db().messages_for_session(&session_id)?))
}

/// DELETE /chat_sessions/:id - Delete a session and everything it owns
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let session_id = parse_session_id(&id)?;
    let documents = state
        .db()
        .delete_session(&session_id)?
        .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

    let mut vectors_removed = 0;
    for document in &documents {
        match state.purge_document(&session_id, document).await {
            Ok(removed) => vectors_removed += removed,
            Err(e) => tracing::error!(
                "Failed to purge document {} of session {}: {}",
                document.id,
                session_id,
                e
            ),
        }
    }
    state
        .vector_store()
        .drop_collection(&collection_name(&session_id))
        .await?;
    state.job_queue().forget_session(session_id);

    tracing::info!(
        "Deleted session {} ({} documents, {} vectors)",
        session_id,
        documents.len(),
        vectors_removed
    );

    Ok(Json(MessageResponse::new(format!(
        "Chat session {} deleted successfully",
        session_id
    ))))
}
