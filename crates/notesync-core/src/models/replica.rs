//! Local replica model

use serde::{Deserialize, Serialize};

use super::note::{NewNote, Note, NoteFields, NoteId};
use crate::util::now_ms;

/// Local copy of a note plus the bookkeeping needed to reconcile it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    /// Unique identifier, shared with the remote record
    pub id: NoteId,
    /// Owner
    pub user_id: String,
    /// Note title
    pub title: String,
    /// Note body
    pub content: String,
    /// Creation timestamp (Unix ms)
    pub inserted_at: i64,
    /// Last local mutation (Unix ms)
    pub updated_at: i64,
    /// Content matches the remote record as of the last reconciliation
    pub is_synced: bool,
    /// Tombstone flag, kept until the deletion is confirmed upstream
    pub is_deleted: bool,
    /// Remote timestamp (Unix ms) captured when a conflict was detected
    pub conflict_version: Option<i64>,
}

impl Replica {
    /// Create a replica for a note written on this device, not yet pushed
    #[must_use]
    pub fn new_offline(
        user_id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        Self {
            id: NoteId::new(),
            user_id: user_id.into(),
            title: title.into(),
            content: content.into(),
            inserted_at: now,
            updated_at: now,
            is_synced: false,
            is_deleted: false,
            conflict_version: None,
        }
    }

    /// Materialize a synced replica from a remote record
    #[must_use]
    pub fn from_remote(note: &Note) -> Self {
        let inserted_at = note.inserted_at_ms();
        Self {
            id: note.id,
            user_id: note.user_id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            inserted_at,
            updated_at: inserted_at,
            is_synced: true,
            is_deleted: false,
            conflict_version: None,
        }
    }

    /// Whether title or content differ from the given remote record
    #[must_use]
    pub fn differs_from(&self, note: &Note) -> bool {
        self.title != note.title || self.content != note.content
    }

    /// Title and content of this replica
    #[must_use]
    pub fn fields(&self) -> NoteFields {
        NoteFields {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }

    /// Insert payload used when the remote side has never seen this note
    #[must_use]
    pub fn to_new_note(&self) -> NewNote {
        NewNote {
            id: self.id,
            title: self.title.clone(),
            content: self.content.clone(),
            user_id: self.user_id.clone(),
        }
    }
}
