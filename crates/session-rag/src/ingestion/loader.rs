//! Fetches raw bytes for a source and hands them to the parser

use reqwest::Client;
use std::time::Duration;

use super::parser::DocumentParser;
use crate::error::{Error, Result};
use crate::types::{FileType, SourceKind};

/// Loads document text from URLs and stored uploads
pub struct DocumentLoader {
    client: Client,
}

impl DocumentLoader {
    pub fn new(fetch_timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(fetch_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Read `source` and extract its text as `file_type`
    pub async fn load(&self, source: &str, kind: SourceKind, file_type: FileType) -> Result<String> {
        let bytes = match kind {
            SourceKind::Url => self.fetch(source).await?,
            SourceKind::File => tokio::fs::read(source).await?,
        };

        tracing::debug!("Loaded {} bytes from {} as {}", bytes.len(), source, file_type);

        let name = source.to_string();
        tokio::task::spawn_blocking(move || DocumentParser::parse(&name, &bytes, file_type))
            .await
            .map_err(|e| Error::internal(format!("Parser task failed: {}", e)))?
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}
