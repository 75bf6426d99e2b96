//! Persistent storage for chat sessions, messages and document metadata

mod database;

pub use database::ChatDb;
