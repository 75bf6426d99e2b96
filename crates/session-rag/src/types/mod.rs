//! Core types for chat sessions, documents and answers

pub mod document;
pub mod query;
pub mod response;
pub mod session;

pub use document::{Chunk, Document, DocumentStatus, DocumentType, FileType, SourceKind};
pub use query::{parse_id, parse_session_id, DeleteDocumentParams, JobFilter, QueryParams, SessionFilter};
pub use response::{Citation, MessageResponse, QueryResponse, UploadResponse};
pub use session::{collection_name, ChatMessage, ChatSession, Sender};
