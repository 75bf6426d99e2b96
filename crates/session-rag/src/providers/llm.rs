//! LLM provider trait for answering from a prepared prompt

use async_trait::async_trait;
use crate::error::Result;

/// Trait for LLM completion
///
/// Implementations:
/// - `OllamaLlm`: local Ollama server
/// - `GeminiLlm`: Google Gemini via API key
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a fully rendered prompt and return the answer text
    async fn generate(&self, prompt: &str) -> Result<String>;

    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model in use
    fn model(&self) -> &str;
}
