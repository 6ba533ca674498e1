//! notesync-core - Core library for notesync
//!
//! This crate contains the offline replica store, the remote notes contract,
//! and the two-way sync and conflict-resolution engine used by notesync
//! front ends.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use config::{RemoteConfig, SyncConfig};
pub use error::{Error, Result};
pub use models::{NewNote, Note, NoteFields, NoteId, Replica};
pub use remote::{InMemoryRemote, RemoteError, RemoteNotes, SupabaseNotesClient};
pub use services::ReplicaStore;
pub use sync::{
    ChangeEvent, ConflictDecision, ConflictResolver, ResolutionChoice, StatusNotifier,
    Subscription, SyncEngine, SyncOutcome, SyncStatus,
};
