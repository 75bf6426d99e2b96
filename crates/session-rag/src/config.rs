//! Configuration for the session RAG backend

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming a TOML config file
pub const CONFIG_PATH_ENV: &str = "SESSION_RAG_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Relational store and upload locations
    pub storage: StorageConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Processing configuration
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load a TOML config file. Missing sections fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: RagConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build config from `SESSION_RAG_CONFIG` (if set) plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(host) = std::env::var("SESSION_RAG_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("SESSION_RAG_PORT") {
            config.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("Invalid SESSION_RAG_PORT '{}': {}", port, e)))?;
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.llm.base_url = url.clone();
            config.embeddings.base_url = url;
        }
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            config.llm.api_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be >= 1".into()));
        }
        if self.retrieval.excerpt_chars == 0 {
            return Err(Error::Config("retrieval.excerpt_chars must be > 0".into()));
        }
        if self.llm.provider == LlmBackend::Gemini && self.llm.api_key.is_none() {
            return Err(Error::Config(
                "llm.provider = \"gemini\" requires llm.api_key or GOOGLE_API_KEY".into(),
            ));
        }
        Ok(())
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("session-rag")
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}

/// Where chat state and uploaded files live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding sessions, messages and documents
    pub database_path: PathBuf,
    /// Directory for uploaded files
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = data_dir();
        Self {
            database_path: root.join("chat.db"),
            upload_dir: root.join("uploaded_documents"),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks fed to the prompt
    pub top_k: usize,
    /// Citation excerpt length in characters
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            excerpt_chars: 200,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// Chunks embedded per provider call
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            batch_size: 32,
        }
    }
}

/// Which LLM answers queries
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Google Gemini via the Generative Language API
    Gemini,
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider selection
    pub provider: LlmBackend,
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Gemini model name
    pub gemini_model: String,
    /// Gemini API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            api_key: None,
            temperature: 0.0,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// SQLite file holding per-session collections
    pub storage_path: PathBuf,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            storage_path: data_dir().join("vectors.db"),
        }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Ingestion jobs allowed to run at once (default: CPU count, max 4)
    pub max_concurrent_jobs: Option<usize>,
    /// Time limit for a single ingestion job
    pub job_timeout_secs: u64,
    /// Timeout for the URL content-type probe
    pub probe_timeout_secs: u64,
    /// Timeout for fetching URL documents
    pub fetch_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: None,
            job_timeout_secs: 300,
            probe_timeout_secs: 5,
            fetch_timeout_secs: 30,
        }
    }
}

impl ProcessingConfig {
    /// Resolve the job concurrency limit
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_jobs
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 800);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.excerpt_chars, 200);
        assert_eq!(config.processing.probe_timeout_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RagConfig = toml::from_str(
            r#"
            [server]
            port = 9001

            [llm]
            provider = "gemini"
            api_key = "k"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.provider, LlmBackend::Gemini);
        assert_eq!(config.chunking.chunk_size, 800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = 800;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn gemini_requires_key() {
        let mut config = RagConfig::default();
        config.llm.provider = LlmBackend::Gemini;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 6\n").unwrap();

        let config = RagConfig::load(&path).unwrap();
        assert_eq!(config.retrieval.top_k, 6);
    }
}
