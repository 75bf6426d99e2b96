//! SQLite store for chat sessions, messages and document metadata

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    ChatMessage, ChatSession, Document, DocumentStatus, DocumentType, Sender,
};

/// SQLite-backed chat database
pub struct ChatDb {
    conn: Arc<Mutex<Connection>>,
}

impl ChatDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open database: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_sessions_updated_at ON chat_sessions(updated_at);

            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                sender TEXT NOT NULL,
                text TEXT NOT NULL,
                sources TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, timestamp);

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                url TEXT,
                file_path TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_session ON documents(session_id);
            "#,
        )
        .map_err(|e| Error::database(format!("Failed to migrate database: {}", e)))?;

        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Fetch a session, creating it if it does not exist
    pub fn ensure_session(&self, id: &Uuid) -> Result<ChatSession> {
        let conn = self.conn.lock();
        ensure_session_in(&conn, id)
    }

    pub fn get_session(&self, id: &Uuid) -> Result<Option<ChatSession>> {
        let conn = self.conn.lock();
        get_session_in(&conn, id)
    }

    /// All sessions, most recently updated first
    pub fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, updated_at FROM chat_sessions
             ORDER BY updated_at DESC, rowid DESC",
        )?;
        let sessions = stmt
            .query_map([], row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Delete a session with its messages and documents
    ///
    /// Returns the deleted documents so the caller can clean up vectors and
    /// uploaded files, or `None` if the session did not exist.
    pub fn delete_session(&self, id: &Uuid) -> Result<Option<Vec<Document>>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        if get_session_in(&tx, id)?.is_none() {
            return Ok(None);
        }

        let documents = documents_for_session_in(&tx, id)?;
        let sid = id.to_string();
        tx.execute("DELETE FROM chat_messages WHERE session_id = ?1", params![sid])?;
        tx.execute("DELETE FROM documents WHERE session_id = ?1", params![sid])?;
        tx.execute("DELETE FROM chat_sessions WHERE id = ?1", params![sid])?;
        tx.commit()?;

        Ok(Some(documents))
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Persist a message, creating its session if needed and bumping the
    /// session's `updated_at`
    pub fn save_message(&self, message: &ChatMessage) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        ensure_session_in(&tx, &message.session_id)?;
        tx.execute(
            "INSERT INTO chat_messages (id, session_id, sender, text, sources, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                message.session_id.to_string(),
                message.sender.as_str(),
                message.text,
                message.encode_sources(),
                fmt_ts(&message.timestamp),
            ],
        )?;
        tx.execute(
            "UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2",
            params![fmt_ts(&message.timestamp), message.session_id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Messages of a session in chronological order
    pub fn messages_for_session(&self, session_id: &Uuid) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, sender, text, sources, timestamp FROM chat_messages
             WHERE session_id = ?1
             ORDER BY timestamp ASC, rowid ASC",
        )?;
        let messages = stmt
            .query_map(params![session_id.to_string()], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Insert a new document row, creating its session if needed
    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        ensure_session_in(&tx, &doc.session_id)?;
        tx.execute(
            "INSERT INTO documents (id, session_id, name, type, status, url, file_path, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                doc.id.to_string(),
                doc.session_id.to_string(),
                doc.name,
                doc.doc_type.as_str(),
                doc.status.as_str(),
                doc.url,
                doc.file_path,
                doc.error,
                fmt_ts(&doc.created_at),
                fmt_ts(&doc.updated_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn get_document(&self, id: &Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        get_document_in(&conn, id)
    }

    /// Documents of a session, oldest first
    pub fn documents_for_session(&self, session_id: &Uuid) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        documents_for_session_in(&conn, session_id)
    }

    /// Advance a document's status
    ///
    /// Returns `Ok(false)` without writing when the move would go backwards
    /// or leave a terminal state.
    pub fn update_document_status(
        &self,
        id: &Uuid,
        status: DocumentStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        let allowed: Vec<&str> = status.predecessors().iter().map(|s| s.as_str()).collect();
        if allowed.is_empty() {
            return Ok(false);
        }

        let placeholders = (0..allowed.len())
            .map(|i| format!("?{}", i + 5))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE documents SET status = ?1, error = ?2, updated_at = ?3
             WHERE id = ?4 AND status IN ({})",
            placeholders
        );

        let next = status.as_str();
        let now = fmt_ts(&Utc::now());
        let id_str = id.to_string();
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&next, &error, &now, &id_str];
        for s in &allowed {
            values.push(s);
        }

        let updated = conn.execute(&sql, values.as_slice())?;
        if updated > 0 {
            return Ok(true);
        }

        match get_document_in(&conn, id)? {
            Some(current) => {
                tracing::warn!(
                    "Refused status change for document {}: {} -> {}",
                    id,
                    current.status.as_str(),
                    status.as_str()
                );
                Ok(false)
            }
            None => Err(Error::DocumentNotFound(id.to_string())),
        }
    }

    /// Delete a document row, returning it if it existed
    pub fn delete_document(&self, id: &Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let Some(doc) = get_document_in(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
        Ok(Some(doc))
    }
}

fn ensure_session_in(conn: &Connection, id: &Uuid) -> Result<ChatSession> {
    let fresh = ChatSession::new(*id);
    conn.execute(
        "INSERT OR IGNORE INTO chat_sessions (id, created_at, updated_at) VALUES (?1, ?2, ?3)",
        params![id.to_string(), fmt_ts(&fresh.created_at), fmt_ts(&fresh.updated_at)],
    )?;
    get_session_in(conn, id)?.ok_or_else(|| Error::SessionNotFound(id.to_string()))
}

fn get_session_in(conn: &Connection, id: &Uuid) -> Result<Option<ChatSession>> {
    let session = conn
        .query_row(
            "SELECT id, created_at, updated_at FROM chat_sessions WHERE id = ?1",
            params![id.to_string()],
            row_to_session,
        )
        .optional()?;
    Ok(session)
}

fn get_document_in(conn: &Connection, id: &Uuid) -> Result<Option<Document>> {
    let doc = conn
        .query_row(
            &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
            params![id.to_string()],
            row_to_document,
        )
        .optional()?;
    Ok(doc)
}

fn documents_for_session_in(conn: &Connection, session_id: &Uuid) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM documents WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
        DOCUMENT_COLUMNS
    ))?;
    let docs = stmt
        .query_map(params![session_id.to_string()], row_to_document)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(docs)
}

const DOCUMENT_COLUMNS: &str =
    "id, session_id, name, type, status, url, file_path, error, created_at, updated_at";

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

fn get_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, format!("bad uuid '{}': {}", raw, e)))
}

fn get_enum<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("unknown value '{}'", raw)))
}

fn row_to_session(row: &Row) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: get_uuid(row, 0)?,
        created_at: get_ts(row, 1)?,
        updated_at: get_ts(row, 2)?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<ChatMessage> {
    let sources: Option<String> = row.get(4)?;
    Ok(ChatMessage {
        id: get_uuid(row, 0)?,
        session_id: get_uuid(row, 1)?,
        sender: get_enum(row, 2, Sender::parse)?,
        text: row.get(3)?,
        sources: ChatMessage::decode_sources(sources.as_deref()),
        timestamp: get_ts(row, 5)?,
    })
}

fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: get_uuid(row, 0)?,
        session_id: get_uuid(row, 1)?,
        name: row.get(2)?,
        doc_type: get_enum(row, 3, DocumentType::parse)?,
        status: get_enum(row, 4, DocumentStatus::parse)?,
        url: row.get(5)?,
        file_path: row.get(6)?,
        error: row.get(7)?,
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Citation, FileType};
    use std::time::Duration;

    fn pause() {
        std::thread::sleep(Duration::from_millis(5));
    }

    #[test]
    fn save_message_creates_session() {
        let db = ChatDb::in_memory().unwrap();
        let session = Uuid::new_v4();
        assert!(db.get_session(&session).unwrap().is_none());

        db.save_message(&ChatMessage::new(session, Sender::User, "hello", Vec::new()))
            .unwrap();

        let stored = db.get_session(&session).unwrap().unwrap();
        assert_eq!(stored.id, session);
        let messages = db.messages_for_session(&session).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");
        assert!(messages[0].sources.is_empty());
    }

    #[test]
    fn sessions_sorted_by_last_activity() {
        let db = ChatDb::in_memory().unwrap();
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();

        db.save_message(&ChatMessage::new(older, Sender::User, "a", Vec::new())).unwrap();
        pause();
        db.save_message(&ChatMessage::new(newer, Sender::User, "b", Vec::new())).unwrap();
        let ids: Vec<_> = db.list_sessions().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer, older]);

        pause();
        db.save_message(&ChatMessage::new(older, Sender::User, "c", Vec::new())).unwrap();
        let ids: Vec<_> = db.list_sessions().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![older, newer]);
    }

    #[test]
    fn message_sources_round_trip() {
        let db = ChatDb::in_memory().unwrap();
        let session = Uuid::new_v4();
        let citation = Citation {
            index: 1,
            document_id: "1234abcd".into(),
            chunk_index: 0,
            score: 0.75,
            content_excerpt: "The sky is blue".into(),
        };
        db.save_message(&ChatMessage::new(session, Sender::User, "q", Vec::new())).unwrap();
        pause();
        db.save_message(&ChatMessage::new(session, Sender::Ai, "blue", vec![citation.clone()]))
            .unwrap();

        let messages = db.messages_for_session(&session).unwrap();
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Ai);
        assert_eq!(messages[1].sources, vec![citation]);
    }

    #[test]
    fn status_transitions_are_monotonic() {
        let db = ChatDb::in_memory().unwrap();
        let doc = Document::from_url(Uuid::new_v4(), "https://example.com");
        db.insert_document(&doc).unwrap();

        assert!(db.update_document_status(&doc.id, DocumentStatus::Processing, None).unwrap());
        assert!(db.update_document_status(&doc.id, DocumentStatus::Ready, None).unwrap());

        assert!(!db.update_document_status(&doc.id, DocumentStatus::Failed, Some("late")).unwrap());
        assert!(!db.update_document_status(&doc.id, DocumentStatus::Processing, None).unwrap());
        assert!(!db.update_document_status(&doc.id, DocumentStatus::Pending, None).unwrap());

        let stored = db.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Ready);
        assert_eq!(stored.error, None);
    }

    #[test]
    fn failed_status_records_error() {
        let db = ChatDb::in_memory().unwrap();
        let doc = Document::from_url(Uuid::new_v4(), "https://example.com");
        db.insert_document(&doc).unwrap();

        assert!(db
            .update_document_status(&doc.id, DocumentStatus::Failed, Some("HTTP 404"))
            .unwrap());
        let stored = db.get_document(&doc.id).unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("HTTP 404"));
    }

    #[test]
    fn status_update_for_missing_document_errors() {
        let db = ChatDb::in_memory().unwrap();
        let err = db
            .update_document_status(&Uuid::new_v4(), DocumentStatus::Processing, None)
            .unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));
    }

    #[test]
    fn delete_session_cascades() {
        let db = ChatDb::in_memory().unwrap();
        let session = Uuid::new_v4();
        let other = Uuid::new_v4();

        db.save_message(&ChatMessage::new(session, Sender::User, "q", Vec::new())).unwrap();
        let doc = Document::from_upload(Uuid::new_v4(), session, "a.txt", FileType::Text, "/tmp/a.txt");
        db.insert_document(&doc).unwrap();
        let kept = Document::from_url(other, "https://example.com");
        db.insert_document(&kept).unwrap();

        let removed = db.delete_session(&session).unwrap().unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, doc.id);

        assert!(db.get_session(&session).unwrap().is_none());
        assert!(db.messages_for_session(&session).unwrap().is_empty());
        assert!(db.documents_for_session(&session).unwrap().is_empty());
        assert!(db.get_document(&kept.id).unwrap().is_some());

        assert!(db.delete_session(&session).unwrap().is_none());
    }

    #[test]
    fn insert_document_creates_session_and_lists() {
        let db = ChatDb::in_memory().unwrap();
        let session = Uuid::new_v4();
        let doc = Document::from_url(session, "https://example.com/a.pdf");
        db.insert_document(&doc).unwrap();

        assert!(db.get_session(&session).unwrap().is_some());
        let docs = db.documents_for_session(&session).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_type, DocumentType::Url);
        assert_eq!(docs[0].status, DocumentStatus::Pending);

        let deleted = db.delete_document(&doc.id).unwrap().unwrap();
        assert_eq!(deleted.id, doc.id);
        assert!(db.delete_document(&doc.id).unwrap().is_none());
    }
}
