//! Inbound realtime change events.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{Note, NoteId};

/// One row-level change on the remote notes table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Note),
    Update(Note),
    Delete { id: NoteId },
}

impl ChangeEvent {
    pub const fn note_id(&self) -> NoteId {
        match self {
            Self::Insert(note) | Self::Update(note) => note.id,
            Self::Delete { id } => *id,
        }
    }

    /// Decode a Supabase realtime `postgres_changes` payload.
    ///
    /// Returns `Ok(None)` for event types other than insert, update and
    /// delete.
    pub fn from_postgres_change(payload: &str) -> Result<Option<Self>> {
        let change: PostgresChange = serde_json::from_str(payload)?;
        match change.event_type.as_str() {
            "INSERT" => Ok(Some(Self::Insert(change.require_new()?))),
            "UPDATE" => Ok(Some(Self::Update(change.require_new()?))),
            "DELETE" => {
                let id = change.old.and_then(|old| old.id).ok_or_else(|| {
                    Error::InvalidInput("DELETE change without old row id".to_string())
                })?;
                Ok(Some(Self::Delete { id }))
            }
            other => {
                tracing::debug!("Ignoring realtime event type {}", other);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgresChange {
    #[serde(rename = "eventType")]
    event_type: String,
    #[serde(default)]
    new: Option<serde_json::Value>,
    #[serde(default)]
    old: Option<OldRow>,
}

impl PostgresChange {
    fn require_new(self) -> Result<Note> {
        let row = self.new.ok_or_else(|| {
            Error::InvalidInput(format!("{} change without new row", self.event_type))
        })?;
        Ok(serde_json::from_value(row)?)
    }
}

#[derive(Debug, Deserialize)]
struct OldRow {
    #[serde(default)]
    id: Option<NoteId>,
}
