//! Data models for notesync

mod note;
mod replica;

pub use note::{NewNote, Note, NoteFields, NoteId};
pub use replica::Replica;
