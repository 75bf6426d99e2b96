//! File-type detection for URLs and uploaded files

use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{FileType, SourceKind};

/// Source of a remote document's `Content-Type`
#[async_trait]
pub trait ContentTypeProbe: Send + Sync {
    /// Content type reported for `url`, or `None` if it could not be determined
    async fn content_type(&self, url: &str) -> Option<String>;
}

/// Probe that issues an HTTP HEAD request
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentTypeProbe for HttpProbe {
    async fn content_type(&self, url: &str) -> Option<String> {
        match self.client.head(url).send().await {
            Ok(response) => response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_ascii_lowercase()),
            Err(e) => {
                tracing::debug!("HEAD {} failed: {}", url, e);
                None
            }
        }
    }
}

/// Decides which loader handles a source
pub struct FileTypeDetector {
    probe: std::sync::Arc<dyn ContentTypeProbe>,
}

impl FileTypeDetector {
    pub fn new(probe: std::sync::Arc<dyn ContentTypeProbe>) -> Self {
        Self { probe }
    }

    /// Detect the type of `source`. Never fails: URLs fall back to html,
    /// files to text.
    pub async fn detect(&self, source: &str, kind: SourceKind) -> FileType {
        match kind {
            SourceKind::File => detect_file(source),
            SourceKind::Url => {
                if let Some(file_type) = url_extension_type(source) {
                    return file_type;
                }
                let content_type = self.probe.content_type(source).await;
                from_content_type(content_type.as_deref())
            }
        }
    }
}

/// Extension-only detection for local files, defaulting to text
pub fn detect_file(path: &str) -> FileType {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FileType::from_extension)
        .unwrap_or(FileType::Text)
}

/// Type implied by the extension of a URL's path, if any
pub fn url_extension_type(url: &str) -> Option<FileType> {
    let path = url_path(url);
    let last_segment = path.rsplit('/').next().unwrap_or("");
    let (_, ext) = last_segment.rsplit_once('.')?;
    FileType::from_extension(ext)
}

/// Map a probed content type; anything unrecognized is treated as html
pub fn from_content_type(content_type: Option<&str>) -> FileType {
    let Some(ct) = content_type.map(|c| c.to_ascii_lowercase()) else {
        return FileType::Html;
    };
    if ct.contains("pdf") {
        FileType::Pdf
    } else if ct.contains("html") {
        FileType::Html
    } else if ct.contains("markdown") || ct.contains("text") {
        FileType::Text
    } else {
        FileType::Html
    }
}

/// Path component of a URL, without scheme, host, query or fragment
fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let end = without_scheme
        .find(|c| c == '?' || c == '#')
        .unwrap_or(without_scheme.len());
    let host_and_path = &without_scheme[..end];
    match host_and_path.find('/') {
        Some(slash) => &host_and_path[slash..],
        None => "",
    }
}
