//! Document ingestion: detect, load, chunk, embed, store

use std::sync::Arc;
use uuid::Uuid;

use super::chunker::TextChunker;
use super::detect::FileTypeDetector;
use super::loader::DocumentLoader;
use crate::error::{Error, Result};
use crate::processing::ProcessingStage;
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::storage::ChatDb;
use crate::types::{collection_name, Chunk, Document, DocumentStatus, FileType};

/// Receives progress from a running ingestion
pub trait IngestProgress: Send + Sync {
    fn stage(&self, _stage: ProcessingStage) {}
    fn chunks_total(&self, _total: usize) {}
    fn chunks_embedded(&self, _count: usize) {}
}

/// Discards progress
pub struct NoProgress;

impl IngestProgress for NoProgress {}

/// Outcome of a successful ingestion
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: Uuid,
    pub file_type: FileType,
    pub chunk_count: usize,
    /// Chunks from an earlier ingestion of the same document that were replaced
    pub replaced: usize,
}

/// Ingestion pipeline for one document at a time
pub struct IngestPipeline {
    db: Arc<ChatDb>,
    vector_store: Arc<dyn VectorStoreProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    detector: FileTypeDetector,
    loader: DocumentLoader,
    chunker: TextChunker,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        db: Arc<ChatDb>,
        vector_store: Arc<dyn VectorStoreProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        detector: FileTypeDetector,
        loader: DocumentLoader,
        chunker: TextChunker,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            vector_store,
            embedder,
            detector,
            loader,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest a stored document and record the outcome on its row
    ///
    /// The document ends `ready` on success and `failed` (with the error
    /// message) otherwise.
    pub async fn run(&self, document_id: Uuid, progress: &dyn IngestProgress) -> Result<IngestReport> {
        let document = self
            .db
            .get_document(&document_id)?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;

        if !self
            .db
            .update_document_status(&document_id, DocumentStatus::Processing, None)?
        {
            return Err(Error::bad_request(format!(
                "Document {} is already {}",
                document_id,
                document.status.as_str()
            )));
        }

        match self.process(&document, progress).await {
            Ok(report) => {
                self.db
                    .update_document_status(&document_id, DocumentStatus::Ready, None)?;
                tracing::info!(
                    "Ingested {} ({}): {} chunks, {} replaced",
                    document.name,
                    report.file_type,
                    report.chunk_count,
                    report.replaced
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Ingestion of {} failed: {}", document.name, e);
                self.mark_failed(&document_id, &e.to_string());
                Err(e)
            }
        }
    }

    /// Record a failure that happened outside [`run`](Self::run), such as a timeout
    pub fn mark_failed(&self, document_id: &Uuid, message: &str) {
        match self
            .db
            .update_document_status(document_id, DocumentStatus::Failed, Some(message))
        {
            Ok(_) => {}
            Err(Error::DocumentNotFound(_)) => {
                tracing::debug!("Document {} was deleted before it could be marked failed", document_id);
            }
            Err(e) => tracing::error!("Failed to mark document {} failed: {}", document_id, e),
        }
    }

    async fn process(&self, document: &Document, progress: &dyn IngestProgress) -> Result<IngestReport> {
        let (source, kind) = document
            .source()
            .ok_or_else(|| Error::bad_request(format!("Document {} has no source", document.id)))?;

        progress.stage(ProcessingStage::Loading);
        let file_type = self.detector.detect(source, kind).await;
        let text = self.loader.load(source, kind, file_type).await?;
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument(document.name.clone()));
        }

        progress.stage(ProcessingStage::Chunking);
        let chunks = self.chunker.chunk_document(document.id, &text);
        if chunks.is_empty() {
            return Err(Error::EmptyDocument(document.name.clone()));
        }
        progress.chunks_total(chunks.len());

        progress.stage(ProcessingStage::Embedding);
        let chunks = self.embed_chunks(chunks, progress).await?;

        progress.stage(ProcessingStage::Storing);
        let chunk_count = chunks.len();
        let replaced = self
            .spawn_store(document.id, collection_name(&document.session_id), chunks)
            .await
            .map_err(|e| Error::internal(format!("Storing task failed: {}", e)))??;

        Ok(IngestReport {
            document_id: document.id,
            file_type,
            chunk_count,
            replaced,
        })
    }

    /// Replace the document's chunks on a detached task
    ///
    /// The write finishes even when the caller is cancelled by a timeout. If
    /// the document is gone or no longer `processing` once the chunks are in,
    /// they are removed again.
    fn spawn_store(
        &self,
        document_id: Uuid,
        collection: String,
        chunks: Vec<Chunk>,
    ) -> tokio::task::JoinHandle<Result<usize>> {
        let db = self.db.clone();
        let vector_store = self.vector_store.clone();

        tokio::spawn(async move {
            let replaced = vector_store.delete_by_document(&collection, &document_id).await?;
            vector_store.add_chunks(&collection, &chunks).await?;

            let status = db.get_document(&document_id)?.map(|d| d.status);
            if status == Some(DocumentStatus::Processing) {
                return Ok(replaced);
            }

            vector_store.delete_by_document(&collection, &document_id).await?;
            match status {
                None => Err(Error::DocumentNotFound(document_id.to_string())),
                Some(status) => Err(Error::internal(format!(
                    "Document {} became {} while its chunks were stored",
                    document_id,
                    status.as_str()
                ))),
            }
        })
    }

    /// Give up on a document whose ingestion was cut short
    ///
    /// Marks it failed, then removes any chunks already written for it.
    pub async fn abandon(&self, session_id: &Uuid, document_id: &Uuid, message: &str) {
        self.mark_failed(document_id, message);

        match self
            .vector_store
            .delete_by_document(&collection_name(session_id), document_id)
            .await
        {
            Ok(0) => {}
            Ok(removed) => tracing::info!(
                "Removed {} chunks of abandoned document {}",
                removed,
                document_id
            ),
            Err(e) => tracing::error!(
                "Failed to remove chunks of abandoned document {}: {}",
                document_id,
                e
            ),
        }
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>, progress: &dyn IngestProgress) -> Result<Vec<Chunk>> {
        let mut embedded = Vec::with_capacity(chunks.len());
        let mut pending = chunks.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} embeddings for {} texts",
                    self.embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }

            progress.chunks_embedded(batch.len());
            embedded.extend(
                batch
                    .into_iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| chunk.with_embedding(vector)),
            );
        }

        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::SqliteVectorStore;
    use crate::test_support::{no_probe, FailingEmbedder, KeywordEmbedder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        db: Arc<ChatDb>,
        store: Arc<SqliteVectorStore>,
        pipeline: IngestPipeline,
        dir: tempfile::TempDir,
    }

    fn fixture(embedder: Arc<dyn EmbeddingProvider>) -> Fixture {
        let db = Arc::new(ChatDb::in_memory().unwrap());
        let store = Arc::new(SqliteVectorStore::in_memory().unwrap());
        let pipeline = IngestPipeline::new(
            db.clone(),
            store.clone(),
            embedder,
            FileTypeDetector::new(no_probe()),
            DocumentLoader::new(5).unwrap(),
            TextChunker::new(100, 10),
            2,
        );
        Fixture {
            db,
            store,
            pipeline,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    impl Fixture {
        fn upload(&self, session: Uuid, name: &str, body: &str) -> Document {
            let id = Uuid::new_v4();
            let path = self.dir.path().join(format!("{}-{}", id, name));
            std::fs::write(&path, body).unwrap();
            let doc = Document::from_upload(
                id,
                session,
                name,
                super::super::detect::detect_file(name),
                path.to_str().unwrap(),
            );
            self.db.insert_document(&doc).unwrap();
            doc
        }
    }

    #[derive(Default)]
    struct Recorder {
        stages: parking_lot::Mutex<Vec<ProcessingStage>>,
        embedded: AtomicUsize,
    }

    impl IngestProgress for Recorder {
        fn stage(&self, stage: ProcessingStage) {
            self.stages.lock().push(stage);
        }

        fn chunks_embedded(&self, count: usize) {
            self.embedded.fetch_add(count, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn text_upload_becomes_ready() {
        let fx = fixture(Arc::new(KeywordEmbedder::default()));
        let session = Uuid::new_v4();
        let doc = fx.upload(session, "a.txt", "The sky is blue.");

        let recorder = Recorder::default();
        let report = fx.pipeline.run(doc.id, &recorder).await.unwrap();
        assert_eq!(report.chunk_count, 1);
        assert_eq!(report.file_type, FileType::Text);
        assert_eq!(report.replaced, 0);

        let stored = fx.db.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Ready);
        assert_eq!(fx.store.count(&collection_name(&session)).await.unwrap(), 1);

        assert_eq!(
            *recorder.stages.lock(),
            vec![
                ProcessingStage::Loading,
                ProcessingStage::Chunking,
                ProcessingStage::Embedding,
                ProcessingStage::Storing,
            ]
        );
        assert_eq!(recorder.embedded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chunks_land_in_their_own_session() {
        let fx = fixture(Arc::new(KeywordEmbedder::default()));
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let doc = fx.upload(a, "a.txt", "The sky is blue.");
        fx.pipeline.run(doc.id, &NoProgress).await.unwrap();

        assert_eq!(fx.store.count(&collection_name(&a)).await.unwrap(), 1);
        assert_eq!(fx.store.count(&collection_name(&b)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn chunk_indices_are_sequential() {
        let fx = fixture(Arc::new(KeywordEmbedder::default()));
        let session = Uuid::new_v4();
        let body = (0..60).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let doc = fx.upload(session, "long.txt", &body);

        let report = fx.pipeline.run(doc.id, &NoProgress).await.unwrap();
        assert!(report.chunk_count > 2);

        let chunks = fx
            .store
            .chunks_for_document(&collection_name(&session), &doc.id)
            .await
            .unwrap();
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        let expected: Vec<u32> = (0..report.chunk_count as u32).collect();
        assert_eq!(indices, expected);
    }

    #[tokio::test]
    async fn empty_file_fails_document() {
        let fx = fixture(Arc::new(KeywordEmbedder::default()));
        let doc = fx.upload(Uuid::new_v4(), "blank.txt", "   \n\n  ");

        let err = fx.pipeline.run(doc.id, &NoProgress).await.unwrap_err();
        assert!(matches!(err, Error::EmptyDocument(_)));

        let stored = fx.db.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert!(stored.error.unwrap().contains("no extractable text"));
    }

    #[tokio::test]
    async fn embedding_failure_leaves_no_vectors() {
        let fx = fixture(Arc::new(FailingEmbedder));
        let session = Uuid::new_v4();
        let doc = fx.upload(session, "a.txt", "The sky is blue.");

        let err = fx.pipeline.run(doc.id, &NoProgress).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(fx.store.count(&collection_name(&session)).await.unwrap(), 0);
        assert_eq!(
            fx.db.get_document(&doc.id).unwrap().unwrap().status,
            DocumentStatus::Failed
        );
    }

    #[tokio::test]
    async fn finished_document_is_not_rerun() {
        let fx = fixture(Arc::new(KeywordEmbedder::default()));
        let doc = fx.upload(Uuid::new_v4(), "a.txt", "The sky is blue.");
        fx.pipeline.run(doc.id, &NoProgress).await.unwrap();

        let err = fx.pipeline.run(doc.id, &NoProgress).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(
            fx.db.get_document(&doc.id).unwrap().unwrap().status,
            DocumentStatus::Ready
        );
    }

    #[tokio::test]
    async fn every_chunk_is_embedded_once() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let fx = fixture(embedder.clone());
        let body = (0..60).map(|i| format!("word{}", i)).collect::<Vec<_>>().join(" ");
        let doc = fx.upload(Uuid::new_v4(), "long.txt", &body);

        let report = fx.pipeline.run(doc.id, &NoProgress).await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), report.chunk_count);
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let fx = fixture(Arc::new(KeywordEmbedder::default()));
        let err = fx.pipeline.run(Uuid::new_v4(), &NoProgress).await.unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }
}
