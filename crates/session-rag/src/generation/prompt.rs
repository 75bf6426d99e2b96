//! Prompt templates for RAG generation

use crate::providers::vector_store::VectorSearchResult;

/// Prompt builder for session queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context from ranked search results
    ///
    /// Each chunk becomes a `Content: ...` block; blocks are separated by a blank line.
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        results
            .iter()
            .map(|result| format!("Content: {}", result.chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the grounded question-answering prompt
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\n\
Context:\n{context}\n\n\
Question: {question}\n\n\
Answer:",
            context = context,
            question = question,
        )
    }
}
