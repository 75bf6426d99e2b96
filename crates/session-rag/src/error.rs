//! Error types for the session RAG backend

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Whether a failed operation is worth retrying
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network hiccup, overloaded upstream, timeout
    Transient,
    /// Bad input that will fail the same way again
    Permanent,
}

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed client request
    #[error("{0}")]
    BadRequest(String),

    /// Document content could not be extracted
    #[error("Failed to parse '{source_name}': {message}")]
    FileParse { source_name: String, message: String },

    /// Loaded document had no text to index
    #[error("Document '{0}' contains no extractable text")]
    EmptyDocument(String),

    /// Remote fetch returned a non-success status
    #[error("Fetching '{url}' failed with HTTP {status}")]
    Fetch { url: String, status: u16 },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// Relational store error
    #[error("Database error: {0}")]
    Database(String),

    /// Ollama/Gemini error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Chat session not found
    #[error("Chat session not found: {0}")]
    SessionNotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Ingestion job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Processing exceeded its time limit
    #[error("Processing timed out after {0}s")]
    Timeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify the error for retry decisions
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Embedding(_)
            | Error::VectorDb(_)
            | Error::Database(_)
            | Error::Llm(_)
            | Error::Timeout(_) => FailureKind::Transient,
            Error::Fetch { status, .. } => {
                if *status == 429 || *status >= 500 {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                }
            }
            Error::Http(err) => {
                let upstream_busy = err
                    .status()
                    .map(|s| s.is_server_error() || s.as_u16() == 429)
                    .unwrap_or(false);
                if err.is_timeout() || err.is_connect() || upstream_busy {
                    FailureKind::Transient
                } else {
                    FailureKind::Permanent
                }
            }
            _ => FailureKind::Permanent,
        }
    }

    /// Shorthand for `failure_kind() == Transient`
    pub fn is_transient(&self) -> bool {
        self.failure_kind() == FailureKind::Transient
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg.clone()),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Error::FileParse { .. } | Error::EmptyDocument(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "parse_error", self.to_string())
            }
            Error::Fetch { .. } => (StatusCode::BAD_GATEWAY, "fetch_error", self.to_string()),
            Error::Embedding(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error", msg.clone())
            }
            Error::VectorDb(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "vector_db_error", msg.clone())
            }
            Error::Database(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", msg.clone())
            }
            Error::Llm(msg) => (StatusCode::SERVICE_UNAVAILABLE, "llm_error", msg.clone()),
            Error::SessionNotFound(_) | Error::DocumentNotFound(_) | Error::JobNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found", self.to_string())
            }
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string()),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (
                StatusCode::BAD_GATEWAY,
                "http_error",
                err.to_string(),
            ),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
