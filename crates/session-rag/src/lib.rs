//! session-rag: chat backend answering questions from per-session document collections
//!
//! Each chat session owns a vector collection. Uploaded files and URLs are
//! parsed, chunked, embedded and indexed in the background; queries are
//! answered by a local or hosted LLM grounded in the session's chunks, with
//! numbered citations.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::RagConfig;
pub use error::{Error, FailureKind, Result};
pub use types::{
    document::{Chunk, Document, DocumentStatus, FileType},
    response::{Citation, QueryResponse},
    session::{ChatMessage, ChatSession},
};
