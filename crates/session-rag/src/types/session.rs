//! Chat sessions and their message history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::response::Citation;

/// A conversation owning messages, documents and one vector collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Bumped on every new message
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `session_{id}_collection`
pub fn collection_name(session_id: &Uuid) -> String {
    format!("session_{}_collection", session_id)
}

/// Author of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

/// Immutable chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender: Sender,
    pub text: String,
    /// Citations backing an AI answer; empty for user messages
    pub sources: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(session_id: Uuid, sender: Sender, text: impl Into<String>, sources: Vec<Citation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            sender,
            text: text.into(),
            sources,
            timestamp: Utc::now(),
        }
    }

    /// Column value for `sources`: JSON text, or NULL when there are none
    pub fn encode_sources(&self) -> Option<String> {
        if self.sources.is_empty() {
            return None;
        }
        serde_json::to_string(&self.sources).ok()
    }

    /// Inverse of [`encode_sources`](Self::encode_sources). Unreadable values decode to nothing.
    pub fn decode_sources(raw: Option<&str>) -> Vec<Citation> {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}
