//! Provider abstractions for embeddings, answer generation, vector storage and uploads
//!
//! The HTTP layer and pipelines only see these traits; concrete clients are
//! chosen once in [`AppState::new`](crate::server::state::AppState::new).

pub mod document_store;
pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

pub use document_store::DocumentStoreProvider;
pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use vector_store::{VectorSearchResult, VectorStoreProvider};
