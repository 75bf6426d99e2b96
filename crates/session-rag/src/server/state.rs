//! Application state for the session RAG server

use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{LlmBackend, RagConfig};
use crate::error::Result;
use crate::ingestion::{ContentTypeProbe, DocumentLoader, FileTypeDetector, HttpProbe, IngestPipeline, TextChunker};
use crate::processing::{IngestionWorker, JobQueue};
use crate::providers::{
    gemini::GeminiLlm,
    local::{LocalDocumentStore, SqliteVectorStore},
    ollama::{OllamaEmbedder, OllamaLlm},
    DocumentStoreProvider, EmbeddingProvider, LlmProvider, VectorStoreProvider,
};
use crate::retrieval::Retriever;
use crate::storage::ChatDb;
use crate::types::{collection_name, Document};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    /// Sessions, messages and document metadata
    db: Arc<ChatDb>,
    /// Per-session chunk collections
    vector_store: Arc<dyn VectorStoreProvider>,
    /// Raw uploads on disk
    document_store: Arc<dyn DocumentStoreProvider>,
    retriever: Retriever,
    /// Job queue for async ingestion
    job_queue: Arc<JobQueue>,
    ready: RwLock<bool>,
}

/// External services handed to [`AppState::from_parts`]
pub struct Services {
    pub db: Arc<ChatDb>,
    pub vector_store: Arc<dyn VectorStoreProvider>,
    pub document_store: Arc<dyn DocumentStoreProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
    pub probe: Arc<dyn ContentTypeProbe>,
}

impl AppState {
    /// Build every service from configuration and start the ingestion worker
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing session RAG state (llm: {:?})...", config.llm.provider);

        let db = Arc::new(ChatDb::new(&config.storage.database_path)?);
        tracing::info!("Chat database at {}", config.storage.database_path.display());

        let vector_store = Arc::new(SqliteVectorStore::new(&config.vector_db.storage_path)?);
        tracing::info!("Vector store at {}", config.vector_db.storage_path.display());

        let document_store = Arc::new(LocalDocumentStore::new(&config.storage.upload_dir)?);

        let embedder = Arc::new(OllamaEmbedder::new(&config.embeddings, &config.llm)?);
        tracing::info!(
            "Ollama embedder initialized ({} at {})",
            config.embeddings.model,
            config.embeddings.base_url
        );

        let llm: Arc<dyn LlmProvider> = match config.llm.provider {
            LlmBackend::Ollama => Arc::new(OllamaLlm::new(&config.llm)?),
            LlmBackend::Gemini => Arc::new(GeminiLlm::new(&config.llm)?),
        };
        tracing::info!("LLM provider: {} ({})", llm.name(), llm.model());

        let probe = Arc::new(HttpProbe::new(config.processing.probe_timeout_secs)?);

        Self::from_parts(
            config,
            Services {
                db,
                vector_store,
                document_store,
                embedder,
                llm,
                probe,
            },
        )
    }

    /// Assemble state from ready-made services; spawns the ingestion worker
    pub fn from_parts(config: RagConfig, services: Services) -> Result<Self> {
        let Services {
            db,
            vector_store,
            document_store,
            embedder,
            llm,
            probe,
        } = services;

        let pipeline = Arc::new(IngestPipeline::new(
            db.clone(),
            vector_store.clone(),
            embedder.clone(),
            FileTypeDetector::new(probe),
            DocumentLoader::new(config.processing.fetch_timeout_secs)?,
            TextChunker::from_config(&config.chunking),
            config.embeddings.batch_size,
        ));

        let retriever = Retriever::new(vector_store.clone(), embedder, llm, &config.retrieval);

        let worker_count = config.processing.concurrency();
        let (job_queue, receiver) = JobQueue::new(worker_count);
        let job_queue = Arc::new(job_queue);
        tracing::info!("Job queue initialized with {} workers", worker_count);

        let worker = IngestionWorker::new(pipeline, job_queue.clone(), &config.processing);
        tokio::spawn(async move {
            worker.run(receiver).await;
        });

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                vector_store,
                document_store,
                retriever,
                job_queue,
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &Arc<ChatDb> {
        &self.inner.db
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.vector_store
    }

    pub fn document_store(&self) -> &Arc<dyn DocumentStoreProvider> {
        &self.inner.document_store
    }

    pub fn retriever(&self) -> &Retriever {
        &self.inner.retriever
    }

    /// Get job queue
    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    /// Ready when not shut down and the vector store answers
    pub async fn is_ready(&self) -> bool {
        if !*self.inner.ready.read() {
            return false;
        }
        matches!(self.inner.vector_store.health_check().await, Ok(true))
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Remove a document's vectors and stored upload
    ///
    /// The metadata row must already be gone.
    pub async fn purge_document(&self, session_id: &Uuid, document: &Document) -> Result<usize> {
        let removed = self
            .inner
            .vector_store
            .delete_by_document(&collection_name(session_id), &document.id)
            .await?;

        if let Some(path) = document.file_path.as_deref() {
            if let Err(e) = self.inner.document_store.delete_upload(path).await {
                tracing::warn!("Failed to delete upload {}: {}", path, e);
            }
        }

        Ok(removed)
    }
}
