//! Response bodies returned by the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Chunk;
use crate::generation::citation::{excerpt, short_document_id};

/// Citation attached to an AI answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    /// 1-based retrieval rank
    pub index: usize,
    /// First 8 characters of the document id
    pub document_id: String,
    pub chunk_index: u32,
    /// Cosine similarity, higher is more relevant
    pub score: f32,
    /// Leading slice of the chunk text
    pub content_excerpt: String,
}

impl Citation {
    /// Create a citation from a ranked chunk
    pub fn from_chunk(index: usize, chunk: &Chunk, score: f32, excerpt_chars: usize) -> Self {
        Self {
            index,
            document_id: short_document_id(&chunk.document_id),
            chunk_index: chunk.chunk_index,
            score,
            content_excerpt: excerpt(&chunk.content, excerpt_chars),
        }
    }
}

/// `GET /query` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub sources: Vec<Citation>,
}

/// `POST /upload_document` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub document_id: Uuid,
    /// Ingestion job to poll at `/jobs/{id}`
    pub job_id: Uuid,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
