//! Remote note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a note, generated client-side as a random UUID v4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new random note ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Canonical note record as stored by the remote backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: NoteId,
    /// Note title
    pub title: String,
    /// Note body
    pub content: String,
    /// Owner
    pub user_id: String,
    /// Server-assigned creation timestamp
    pub inserted_at: DateTime<Utc>,
}

impl Note {
    /// Creation timestamp in Unix milliseconds
    #[must_use]
    pub fn inserted_at_ms(&self) -> i64 {
        self.inserted_at.timestamp_millis()
    }

    /// Title and content of this record
    #[must_use]
    pub fn fields(&self) -> NoteFields {
        NoteFields {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

/// Insert payload for a note created on this device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub user_id: String,
}

/// The user-editable fields of a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFields {
    pub title: String,
    pub content: String,
}

impl NoteFields {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_id_unique() {
        let id1 = NoteId::new();
        let id2 = NoteId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_note_id_parse() {
        let id = NoteId::new();
        let parsed: NoteId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_note_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<NoteId>().is_err());
    }

    #[test]
    fn test_note_deserializes_postgrest_row() {
        let payload = r#"{
            "id": "6f1c2d3e-4b5a-4c6d-8e7f-901234567890",
            "title": "Groceries",
            "content": "milk",
            "user_id": "user-1",
            "inserted_at": "2024-05-01T10:00:00.123456+00:00"
        }"#;

        let note: Note = serde_json::from_str(payload).unwrap();
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.user_id, "user-1");
        assert_eq!(note.inserted_at_ms(), 1_714_557_600_123);
    }

    #[test]
    fn test_note_id_serializes_as_plain_string() {
        let id: NoteId = "6f1c2d3e-4b5a-4c6d-8e7f-901234567890".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"6f1c2d3e-4b5a-4c6d-8e7f-901234567890\"");
    }
}
