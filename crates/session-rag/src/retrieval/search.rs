//! Session-scoped retrieval and grounded answer generation

use std::sync::Arc;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::generation::{build_citations, PromptBuilder};
use crate::providers::{EmbeddingProvider, LlmProvider, VectorSearchResult, VectorStoreProvider};
use crate::types::{collection_name, QueryResponse};

/// Answer for a session with nothing indexed
pub const NO_DOCUMENTS_MESSAGE: &str =
    "I can only answer questions based on uploaded documents. Please upload a document to start chatting.";

/// Answer when the search returns nothing
pub const NO_RESULTS_MESSAGE: &str =
    "I couldn't find any relevant information in the uploaded documents.";

/// Answer returned in place of any retrieval or generation error
pub const ERROR_MESSAGE: &str = "Sorry, I encountered an error while processing your query.";

/// Retrieval-augmented answering over one session's collection
pub struct Retriever {
    vector_store: Arc<dyn VectorStoreProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
    excerpt_chars: usize,
}

impl Retriever {
    pub fn new(
        vector_store: Arc<dyn VectorStoreProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            llm,
            top_k: config.top_k.max(1),
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// Answer `query` from the documents of `session_id`
    pub async fn answer(&self, session_id: &Uuid, query: &str) -> Result<QueryResponse> {
        let collection = collection_name(session_id);

        if self.vector_store.is_empty(&collection).await? {
            tracing::debug!("Session {} has no indexed documents", session_id);
            return Ok(canned(NO_DOCUMENTS_MESSAGE));
        }

        let query_embedding = self.embedder.embed(query).await?;
        let mut results = self
            .vector_store
            .similarity_search(&collection, &query_embedding, self.top_k)
            .await?;

        if results.is_empty() {
            return Ok(canned(NO_RESULTS_MESSAGE));
        }

        rank_results(&mut results);

        let context = PromptBuilder::build_context(&results);
        let sources = build_citations(&results, self.excerpt_chars);
        let prompt = PromptBuilder::build_rag_prompt(query, &context);

        tracing::debug!(
            "Generating answer with {} ({} chunks of context)",
            self.llm.model(),
            results.len()
        );
        let response = self.llm.generate(&prompt).await?;

        Ok(QueryResponse { response, sources })
    }

    /// Like [`answer`](Self::answer), but any error becomes the fixed apology
    pub async fn answer_or_apologize(&self, session_id: &Uuid, query: &str) -> QueryResponse {
        match self.answer(session_id, query).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Query for session {} failed: {}", session_id, e);
                canned(ERROR_MESSAGE)
            }
        }
    }
}

/// Best match first; scores are cosine similarities
pub fn rank_results(results: &mut [VectorSearchResult]) {
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}

fn canned(message: &str) -> QueryResponse {
    QueryResponse {
        response: message.to_string(),
        sources: Vec::new(),
    }
}
