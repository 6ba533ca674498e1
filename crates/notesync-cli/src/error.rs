use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] notesync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Note title cannot be empty")]
    EmptyTitle,
    #[error("Nothing to change; pass --title and/or --content")]
    NothingToEdit,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("No open conflict for note {0}")]
    NoOpenConflict(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "No owner id. Pass --user, set NOTESYNC_USER_ID, or run `notesync config init --user-id <ID>`."
    )]
    UserNotConfigured,
    #[error(
        "Sync is not configured. Run `notesync config init` or set SUPABASE_URL and SUPABASE_ANON_KEY, then set NOTESYNC_ACCESS_TOKEN."
    )]
    SyncNotConfigured,
}
