//! Local provider implementations using SQLite and the filesystem

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

use super::document_store::DocumentStoreProvider;
use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Vector store keeping per-session collections in one SQLite file
///
/// Search is an exact scan over the collection's rows, which is fine at
/// chat-session scale.
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVectorStore {
    /// Create or open the store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::vector_db(format!("Failed to open vector store: {}", e)))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::vector_db(format!("Failed to open in-memory vector store: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection);
            CREATE INDEX IF NOT EXISTS idx_chunks_collection_document ON chunks(collection, document_id);
            "#,
        )
        .map_err(|e| Error::vector_db(format!("Failed to migrate vector store: {}", e)))?;
        Ok(())
    }

    fn add_chunks_blocking(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if let Some(chunk) = chunks.iter().find(|c| c.embedding.is_empty()) {
            return Err(Error::vector_db(format!(
                "Chunk {} of document {} has no embedding",
                chunk.chunk_index, chunk.document_id
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO collections (name, created_at) VALUES (?1, ?2)",
            params![collection, Utc::now().to_rfc3339()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO chunks (id, collection, document_id, chunk_index, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.id.to_string(),
                    collection,
                    chunk.document_id.to_string(),
                    chunk.chunk_index,
                    chunk.content,
                    vec_to_blob(&chunk.embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn search_blocking(&self, collection: &str, query: &[f32], k: usize) -> Result<Vec<VectorSearchResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, content, embedding FROM chunks WHERE collection = ?1",
        )?;

        let mut scored = Vec::new();
        let rows = stmt.query_map(params![collection], |row| {
            let id: String = row.get(0)?;
            let document_id: String = row.get(1)?;
            let chunk_index: u32 = row.get(2)?;
            let content: String = row.get(3)?;
            let blob: Vec<u8> = row.get(4)?;
            Ok((id, document_id, chunk_index, content, blob))
        })?;

        for row in rows {
            let (id, document_id, chunk_index, content, blob) = row?;
            let similarity = cosine_similarity(query, &blob_to_vec(&blob));
            let chunk = Chunk {
                id: parse_uuid(&id)?,
                document_id: parse_uuid(&document_id)?,
                chunk_index,
                content,
                embedding: Vec::new(),
            };
            scored.push(VectorSearchResult { chunk, similarity });
        }

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(k);
        Ok(scored)
    }

    fn delete_by_document_blocking(&self, collection: &str, document_id: &Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM chunks WHERE collection = ?1 AND document_id = ?2",
            params![collection, document_id.to_string()],
        )?;
        Ok(deleted)
    }

    fn count_blocking(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn chunks_for_document_blocking(&self, collection: &str, document_id: &Uuid) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, chunk_index, content FROM chunks
             WHERE collection = ?1 AND document_id = ?2
             ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map(params![collection, document_id.to_string()], |row| {
            let id: String = row.get(0)?;
            let chunk_index: u32 = row.get(1)?;
            let content: String = row.get(2)?;
            Ok((id, chunk_index, content))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (id, chunk_index, content) = row?;
            chunks.push(Chunk {
                id: parse_uuid(&id)?,
                document_id: *document_id,
                chunk_index,
                content,
                embedding: Vec::new(),
            });
        }
        Ok(chunks)
    }

    fn drop_collection_blocking(&self, collection: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE collection = ?1", params![collection])?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![collection])?;
        tx.commit()?;
        Ok(())
    }

    /// Whether a collection has been created
    pub fn has_collection(&self, collection: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM collections WHERE name = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteVectorStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl VectorStoreProvider for SqliteVectorStore {
    async fn add_chunks(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let collection = collection.to_string();
        let chunks = chunks.to_vec();
        self.blocking(move |store| store.add_chunks_blocking(&collection, &chunks))
            .await
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        let collection = collection.to_string();
        let query = query_embedding.to_vec();
        self.blocking(move |store| store.search_blocking(&collection, &query, k))
            .await
    }

    async fn delete_by_document(&self, collection: &str, document_id: &Uuid) -> Result<usize> {
        let collection = collection.to_string();
        let doc_id = *document_id;
        self.blocking(move |store| store.delete_by_document_blocking(&collection, &doc_id))
            .await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collection = collection.to_string();
        self.blocking(move |store| store.count_blocking(&collection)).await
    }

    async fn chunks_for_document(&self, collection: &str, document_id: &Uuid) -> Result<Vec<Chunk>> {
        let collection = collection.to_string();
        let doc_id = *document_id;
        self.blocking(move |store| store.chunks_for_document_blocking(&collection, &doc_id))
            .await
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let collection = collection.to_string();
        self.blocking(move |store| store.drop_collection_blocking(&collection))
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        let conn = self.conn.lock();
        Ok(conn.execute_batch("SELECT 1").is_ok())
    }

    fn name(&self) -> &str {
        "sqlite-cosine"
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::vector_db(format!("Corrupt id '{}': {}", raw, e)))
}

/// Encode a float vector as little-endian f32 bytes
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes written by [`vec_to_blob`]
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; 0.0 for empty, zero or mismatched vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Local document store using filesystem
pub struct LocalDocumentStore {
    /// Root upload directory
    storage_dir: PathBuf,
}

impl LocalDocumentStore {
    /// Create a new local document store
    pub fn new(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        std::fs::create_dir_all(&storage_dir)?;
        Ok(Self { storage_dir })
    }

    /// Path an upload will be written to. Only the final path component of
    /// `filename` is kept.
    pub fn upload_path(&self, doc_id: &Uuid, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        self.storage_dir.join(doc_id.to_string()).join(name)
    }
}

#[async_trait]
impl DocumentStoreProvider for LocalDocumentStore {
    async fn store_upload(&self, doc_id: &Uuid, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.upload_path(doc_id, filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    async fn delete_upload(&self, path: &str) -> Result<()> {
        let path = Path::new(path);
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        // Per-document directory; only removed once empty
        if let Some(parent) = path.parent() {
            if parent.starts_with(&self.storage_dir) && parent != self.storage_dir {
                let _ = tokio::fs::remove_dir(parent).await;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.storage_dir.exists())
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}
