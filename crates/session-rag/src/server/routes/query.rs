//! Query endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{parse_session_id, ChatMessage, QueryParams, QueryResponse, Sender};

/// GET /query - Answer a question from the session's documents
///
/// Both sides of the exchange are saved to the session history. Retrieval
/// and generation failures come back as a fixed apology, not an HTTP error.
pub async fn query_session(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>> {
    let session_id = parse_session_id(&params.session_id)?;
    let question = params.input_message;

    tracing::info!("Query for session {}: \"{}\"", session_id, question);

    state
        .db()
        .save_message(&ChatMessage::new(session_id, Sender::User, question.as_str(), Vec::new()))?;

    let answer = state
        .retriever()
        .answer_or_apologize(&session_id, &question)
        .await;

    state.db().save_message(&ChatMessage::new(
        session_id,
        Sender::Ai,
        answer.response.as_str(),
        answer.sources.clone(),
    ))?;

    Ok(Json(answer))
}
