//! Vector store provider trait: named collections of embedded chunks

use async_trait::async_trait;
use uuid::Uuid;
use crate::error::Result;
use crate::types::Chunk;

/// Search result from vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// The matched chunk (embedding not populated)
    pub chunk: Chunk,
    /// Cosine similarity, higher is more similar
    pub similarity: f32,
}

/// Trait for vector storage and similarity search
///
/// Every operation is scoped to a collection; each chat session owns exactly
/// one (`session_{id}_collection`). Collections are created on first write.
///
/// Implementations:
/// - `SqliteVectorStore`: brute-force cosine search over SQLite rows
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert chunks that already carry embeddings
    async fn add_chunks(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Top `k` chunks by similarity, best first
    async fn similarity_search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<VectorSearchResult>>;

    /// Delete all chunks of a document; returns how many were removed
    async fn delete_by_document(&self, collection: &str, document_id: &Uuid) -> Result<usize>;

    /// Number of chunks in the collection (0 if it does not exist)
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Chunks belonging to one document, ordered by chunk index
    async fn chunks_for_document(&self, collection: &str, document_id: &Uuid) -> Result<Vec<Chunk>>;

    /// Remove the collection and anything left in it
    async fn drop_collection(&self, collection: &str) -> Result<()>;

    /// Check if store is empty for a collection
    async fn is_empty(&self, collection: &str) -> Result<bool> {
        Ok(self.count(collection).await? == 0)
    }

    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
