//! Committing human (or policy) decisions for detected conflicts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{NoteFields, NoteId, Replica};
use crate::remote::{RemoteError, RemoteNotes, RemoteResult};
use crate::services::ReplicaStore;
use crate::util::now_ms;

/// Which version of a conflicting note survives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum ResolutionChoice {
    /// Push the local title and content over the remote record
    KeepLocal,
    /// Overwrite the local replica from a fresh read of the remote record
    KeepRemote,
    /// Write the given fields to both sides
    Merge { title: String, content: String },
}

/// A decision for one open conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDecision {
    pub note_id: NoteId,
    #[serde(flatten)]
    pub choice: ResolutionChoice,
}

impl ConflictDecision {
    pub const fn keep_local(note_id: NoteId) -> Self {
        Self {
            note_id,
            choice: ResolutionChoice::KeepLocal,
        }
    }

    pub const fn keep_remote(note_id: NoteId) -> Self {
        Self {
            note_id,
            choice: ResolutionChoice::KeepRemote,
        }
    }

    pub fn merge(note_id: NoteId, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            note_id,
            choice: ResolutionChoice::Merge {
                title: title.into(),
                content: content.into(),
            },
        }
    }
}

/// Applies a [`ConflictDecision`] to the remote record and the local replica.
///
/// A failed remote call leaves the local replica untouched and unsynced so
/// the conflict can be resolved again.
#[derive(Clone)]
pub struct ConflictResolver {
    store: ReplicaStore,
    remote: Arc<dyn RemoteNotes>,
    call_timeout: Duration,
}

impl ConflictResolver {
    pub fn new(store: ReplicaStore, remote: Arc<dyn RemoteNotes>, call_timeout: Duration) -> Self {
        Self {
            store,
            remote,
            call_timeout,
        }
    }

    /// Commit `decision` for a note owned by `user_id`.
    ///
    /// Returns `Ok(None)` when the note has no pending replica, which makes a
    /// repeated decision a no-op.
    pub async fn resolve(
        &self,
        decision: &ConflictDecision,
        user_id: &str,
    ) -> Result<Option<Replica>> {
        let id = decision.note_id;
        let Some(local) = self.store.get(&id).await? else {
            tracing::debug!("No replica for note {}; nothing to resolve", id);
            return Ok(None);
        };
        if local.user_id != user_id || local.is_synced || local.is_deleted {
            tracing::debug!("Note {} has no pending change; nothing to resolve", id);
            return Ok(None);
        }

        let resolved = match &decision.choice {
            ResolutionChoice::KeepLocal => self.keep_local(local).await?,
            ResolutionChoice::KeepRemote => self.keep_remote(local).await?,
            ResolutionChoice::Merge { title, content } => {
                self.merge(local, NoteFields::new(title.as_str(), content.as_str()))
                    .await?
            }
        };

        tracing::info!("Resolved conflict for note {}", id);
        Ok(Some(resolved))
    }

    async fn keep_local(&self, local: Replica) -> Result<Replica> {
        self.call(&local.id, self.remote.update(&local.id, &local.fields()))
            .await?;

        if !self
            .store
            .mark_synced_if_unchanged(&local.id, local.updated_at)
            .await?
        {
            tracing::debug!(
                "Note {} was edited while its local version was pushed; it stays pending",
                local.id
            );
        }
        self.store
            .get(&local.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Note {} not found", local.id)))
    }

    async fn keep_remote(&self, local: Replica) -> Result<Replica> {
        let remote = self
            .call(&local.id, self.remote.get_one(&local.id))
            .await?
            .ok_or_else(|| Error::resolution_failed(local.id, "remote note no longer exists"))?;

        let resolved = Replica {
            title: remote.title.clone(),
            content: remote.content.clone(),
            updated_at: remote.inserted_at_ms(),
            is_synced: true,
            conflict_version: None,
            ..local
        };
        self.store.upsert(&resolved).await?;
        Ok(resolved)
    }

    async fn merge(&self, local: Replica, fields: NoteFields) -> Result<Replica> {
        self.call(&local.id, self.remote.update(&local.id, &fields))
            .await?;

        let resolved = Replica {
            title: fields.title,
            content: fields.content,
            updated_at: now_ms(),
            is_synced: true,
            conflict_version: None,
            ..local
        };
        self.store.upsert(&resolved).await?;
        Ok(resolved)
    }

    async fn call<T>(
        &self,
        id: &NoteId,
        request: impl Future<Output = RemoteResult<T>>,
    ) -> Result<T> {
        let result = tokio::time::timeout(self.call_timeout, request)
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(self.call_timeout)));

        result.map_err(|error| {
            tracing::warn!("Conflict resolution for note {} failed: {}", id, error);
            Error::resolution_failed(id, error)
        })
    }
}
