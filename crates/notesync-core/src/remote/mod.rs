//! Remote notes backend contract and its implementations.

mod memory;
mod supabase;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewNote, Note, NoteFields, NoteId};

pub use memory::InMemoryRemote;
pub use supabase::{normalize_rest_url, SupabaseNotesClient};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Notes API error: {0}")]
    Api(String),
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The narrow set of calls the sync engine makes against the backend.
///
/// Implementations must be safe to share across tasks; the engine holds one
/// behind an `Arc` for the lifetime of a session.
#[async_trait]
pub trait RemoteNotes: Send + Sync {
    /// Every record owned by `user_id`.
    async fn fetch_all(&self, user_id: &str) -> RemoteResult<Vec<Note>>;

    /// Create a record and return it as stored, with its server timestamp.
    async fn insert(&self, note: &NewNote) -> RemoteResult<Note>;

    /// Overwrite title and content of an existing record.
    async fn update(&self, id: &NoteId, fields: &NoteFields) -> RemoteResult<()>;

    /// Remove a record.
    async fn delete(&self, id: &NoteId) -> RemoteResult<()>;

    /// Point read; `None` when the record does not exist.
    async fn get_one(&self, id: &NoteId) -> RemoteResult<Option<Note>>;
}
