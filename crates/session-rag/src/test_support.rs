//! In-process fakes shared by unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::ContentTypeProbe;
use crate::providers::{
    local::SqliteVectorStore, EmbeddingProvider, LlmProvider, VectorSearchResult, VectorStoreProvider,
};
use crate::types::Chunk;

pub const DIMS: usize = 64;

/// Bag-of-words embedder: texts sharing words land close together
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.to_lowercase().bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        v[(h % (DIMS as u64 - 1)) as usize] += 1.0;
    }
    v[DIMS - 1] = 0.01;
    v
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(keyword_vector(text))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::embedding("connection refused"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Answers "blue" when the prompt carries the sky fact, otherwise declines
#[derive(Default)]
pub struct ScriptedLlm {
    pub prompts: parking_lot::Mutex<Vec<String>>,
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if prompt.contains("The sky is blue") {
            Ok("blue".to_string())
        } else {
            Ok("I don't know.".to_string())
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

pub struct FailingLlm;

#[async_trait]
impl LlmProvider for FailingLlm {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::llm("model not loaded"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn model(&self) -> &str {
        "none"
    }
}

/// Probe that never reaches the network
pub struct NoProbe;

#[async_trait]
impl ContentTypeProbe for NoProbe {
    async fn content_type(&self, _url: &str) -> Option<String> {
        None
    }
}

pub fn no_probe() -> Arc<dyn ContentTypeProbe> {
    Arc::new(NoProbe)
}

/// In-memory SQLite store with injectable latency and failures
///
/// A delayed write is not cancelled with its caller, like a blocking task.
pub struct ScriptedVectorStore {
    pub inner: Arc<SqliteVectorStore>,
    pub write_delay: Duration,
    pub writes_landed: Arc<AtomicBool>,
    pub failing_delete: Option<Uuid>,
}

impl ScriptedVectorStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SqliteVectorStore::in_memory().unwrap()),
            write_delay: Duration::ZERO,
            writes_landed: Arc::new(AtomicBool::new(false)),
            failing_delete: None,
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn failing_deletes_for(mut self, document_id: Uuid) -> Self {
        self.failing_delete = Some(document_id);
        self
    }
}

#[async_trait]
impl VectorStoreProvider for ScriptedVectorStore {
    async fn add_chunks(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let inner = self.inner.clone();
        let landed = self.writes_landed.clone();
        let delay = self.write_delay;
        let collection = collection.to_string();
        let chunks = chunks.to_vec();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = inner.add_chunks(&collection, &chunks).await;
            landed.store(true, Ordering::SeqCst);
            result
        })
        .await
        .map_err(|e| Error::internal(e.to_string()))?
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        self.inner.similarity_search(collection, query_embedding, k).await
    }

    async fn delete_by_document(&self, collection: &str, document_id: &Uuid) -> Result<usize> {
        if self.failing_delete == Some(*document_id) {
            return Err(Error::vector_db("disk I/O error"));
        }
        self.inner.delete_by_document(collection, document_id).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }

    async fn chunks_for_document(&self, collection: &str, document_id: &Uuid) -> Result<Vec<Chunk>> {
        self.inner.chunks_for_document(collection, document_id).await
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        self.inner.drop_collection(collection).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        "scripted-sqlite"
    }
}
