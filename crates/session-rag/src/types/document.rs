//! Document metadata, ingestion status and indexed chunks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Content format the loader dispatches on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Markdown file
    Markdown,
    /// HTML document
    Html,
    /// Plain text (also the fallback for unknown uploads)
    Text,
}

impl FileType {
    /// Map a file extension (without the dot) to a known format
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a document source was handed to us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Remote URL
    Url,
    /// Uploaded file on local disk
    File,
}

/// Persisted document `type` column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Url,
    Pdf,
    Markdown,
    Html,
    Text,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "url" => Some(Self::Url),
            "pdf" => Some(Self::Pdf),
            "markdown" => Some(Self::Markdown),
            "html" => Some(Self::Html),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl From<FileType> for DocumentType {
    fn from(file_type: FileType) -> Self {
        match file_type {
            FileType::Pdf => Self::Pdf,
            FileType::Markdown => Self::Markdown,
            FileType::Html => Self::Html,
            FileType::Text => Self::Text,
        }
    }
}

/// Ingestion status of a document
///
/// Moves `pending -> processing -> ready | failed` (or straight from
/// `pending` to a terminal state). `ready` and `failed` never change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// States from which `self` may be entered
    pub fn predecessors(&self) -> &'static [DocumentStatus] {
        match self {
            Self::Pending => &[],
            Self::Processing => &[Self::Pending],
            Self::Ready | Self::Failed => &[Self::Pending, Self::Processing],
        }
    }

    pub fn can_advance_to(&self, next: DocumentStatus) -> bool {
        next.predecessors().contains(self)
    }
}

/// Document metadata row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub session_id: Uuid,
    /// URL or original filename
    pub name: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub url: Option<String>,
    pub file_path: Option<String>,
    /// Failure message when `status == failed`
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// New pending document for a remote URL
    pub fn from_url(session_id: Uuid, url: impl Into<String>) -> Self {
        let url = url.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            name: url.clone(),
            doc_type: DocumentType::Url,
            status: DocumentStatus::Pending,
            url: Some(url),
            file_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// New pending document for a stored upload
    pub fn from_upload(
        id: Uuid,
        session_id: Uuid,
        filename: impl Into<String>,
        file_type: FileType,
        file_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_id,
            name: filename.into(),
            doc_type: file_type.into(),
            status: DocumentStatus::Pending,
            url: None,
            file_path: Some(file_path.into()),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Location to load content from: the URL if set, else the stored file
    pub fn source(&self) -> Option<(&str, SourceKind)> {
        if let Some(url) = self.url.as_deref() {
            return Some((url, SourceKind::Url));
        }
        self.file_path
            .as_deref()
            .map(|path| (path, SourceKind::File))
    }
}

/// A chunk of document text stored in a session collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Position within the document, starting at 0
    pub chunk_index: u32,
    pub content: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn new(document_id: Uuid, chunk_index: u32, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            chunk_index,
            content,
            embedding: Vec::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        use DocumentStatus::*;
        assert!(Pending.can_advance_to(Processing));
        assert!(Pending.can_advance_to(Failed));
        assert!(Processing.can_advance_to(Ready));
        assert!(Processing.can_advance_to(Failed));

        assert!(!Ready.can_advance_to(Pending));
        assert!(!Ready.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Processing));
        assert!(!Processing.can_advance_to(Pending));
    }

    #[test]
    fn url_takes_precedence_as_source() {
        let session = Uuid::new_v4();
        let doc = Document::from_url(session, "https://example.com/a.pdf");
        assert_eq!(doc.source(), Some(("https://example.com/a.pdf", SourceKind::Url)));
        assert_eq!(doc.doc_type, DocumentType::Url);

        let upload = Document::from_upload(Uuid::new_v4(), session, "a.md", FileType::Markdown, "/tmp/a.md");
        assert_eq!(upload.source(), Some(("/tmp/a.md", SourceKind::File)));
        assert_eq!(upload.doc_type, DocumentType::Markdown);
    }

    #[test]
    fn type_serializes_lowercase() {
        let doc = Document::from_url(Uuid::new_v4(), "https://example.com");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "url");
        assert_eq!(value["status"], "pending");
    }
}
