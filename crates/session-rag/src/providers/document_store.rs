//! Document store provider trait for uploaded files

use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;
use crate::error::Result;

/// Trait for storing raw uploads
///
/// Implementations:
/// - `LocalDocumentStore`: `{upload_dir}/{document_id}/{filename}`
#[async_trait]
pub trait DocumentStoreProvider: Send + Sync {
    /// Persist an upload and return its path
    async fn store_upload(&self, doc_id: &Uuid, filename: &str, data: &[u8]) -> Result<PathBuf>;

    /// Remove a stored upload. Missing files are not an error.
    async fn delete_upload(&self, path: &str) -> Result<()>;

    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
