//! Answer generation: prompt assembly, citations and the Ollama client

pub mod citation;
pub mod ollama;
pub mod prompt;

pub use citation::build_citations;
pub use ollama::OllamaClient;
pub use prompt::PromptBuilder;
