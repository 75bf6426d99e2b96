//! Document ingestion: type detection, loading, parsing, chunking and indexing

mod chunker;
mod detect;
mod loader;
mod parser;
mod pipeline;

pub use chunker::{TextChunker, DEFAULT_SEPARATORS};
pub use detect::{detect_file, ContentTypeProbe, FileTypeDetector, HttpProbe};
pub use loader::DocumentLoader;
pub use parser::DocumentParser;
pub use pipeline::{IngestPipeline, IngestProgress, IngestReport, NoProgress};
