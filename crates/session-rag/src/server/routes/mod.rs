//! API routes for the session RAG server

pub mod documents;
pub mod jobs;
pub mod query;
pub mod sessions;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;
use crate::types::MessageResponse;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        // Ingestion - with larger body limit for file uploads
        .route(
            "/upload_document",
            post(upload::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Query
        .route("/query", get(query::query_session))
        // Sessions
        .route("/chat_sessions", get(sessions::list_sessions))
        .route("/chat_sessions/:id", axum::routing::delete(sessions::delete_session))
        .route("/chat_sessions/:id/messages", get(sessions::list_messages))
        // Document management
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        // Job management
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job_progress))
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello World"))
}
