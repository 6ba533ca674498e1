//! Error types for notesync-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using notesync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notesync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The replica store could not be opened or prepared
    #[error("Replica storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// A single remote call failed
    #[error("Remote unreachable: {0}")]
    RemoteUnreachable(#[from] RemoteError),

    /// The remote snapshot for a sync pass could not be fetched
    #[error("Sync failed: could not fetch remote snapshot: {0}")]
    SnapshotFetchFailed(RemoteError),

    /// A conflict resolution did not take effect
    #[error("Conflict resolution for note {note_id} failed: {reason}")]
    ResolutionFailed {
        /// Note whose conflict stays open
        note_id: String,
        /// Why the commit did not succeed
        reason: String,
    },

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a `ResolutionFailed` error for the given note
    pub fn resolution_failed(note_id: impl ToString, reason: impl ToString) -> Self {
        Self::ResolutionFailed {
            note_id: note_id.to_string(),
            reason: reason.to_string(),
        }
    }
}
