//! Shared replica store wrapper used by the sync engine and the CLI.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlReplicaRepository, ReplicaRepository};
use crate::models::{NoteFields, NoteId, Replica};
use crate::util::now_ms;
use crate::{Error, Result};

/// Thread-safe service for replica storage operations.
///
/// Clones share one connection; every call takes the connection lock for the
/// duration of a single statement, so mutations of one replica never
/// interleave.
#[derive(Clone)]
pub struct ReplicaStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl ReplicaStore {
    /// Open (or create) the replica store at the given filesystem path.
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                tracing::error!(
                    "Failed to create replica store directory {}: {}",
                    parent.display(),
                    error
                );
                Error::StorageUnavailable(format!("{}: {error}", parent.display()))
            })?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened replica store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory replica store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location of the store, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Non-tombstoned replicas for an owner, newest first.
    pub async fn list_active(&self, user_id: &str) -> Result<Vec<Replica>> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.list_active(user_id).await
    }

    /// Fetch a non-tombstoned replica by id.
    pub async fn get_active(&self, id: &NoteId) -> Result<Option<Replica>> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.get_active(id).await
    }

    /// Fetch any replica by id, tombstones included.
    pub async fn get(&self, id: &NoteId) -> Result<Option<Replica>> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.get(id).await
    }

    /// Replace or insert a replica.
    pub async fn upsert(&self, replica: &Replica) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.upsert(replica).await
    }

    /// Tombstone a replica. Absent ids are a successful no-op.
    pub async fn tombstone(&self, id: &NoteId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        if !repo.tombstone(id, now_ms()).await? {
            tracing::debug!("Tombstone requested for unknown replica {}", id);
        }
        Ok(())
    }

    /// Replicas with pending obligations, tombstones included.
    pub async fn list_unsynced(&self, user_id: &str) -> Result<Vec<Replica>> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.list_unsynced(user_id).await
    }

    /// Number of replicas with pending obligations.
    pub async fn count_unsynced(&self, user_id: &str) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.count_unsynced(user_id).await
    }

    /// Mark a replica synced. Absent ids are a successful no-op.
    pub async fn mark_synced(&self, id: &NoteId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.mark_synced(id).await?;
        Ok(())
    }

    /// Mark a replica synced only if it was not edited after `updated_at`.
    ///
    /// Returns whether the replica was marked.
    pub async fn mark_synced_if_unchanged(&self, id: &NoteId, updated_at: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.mark_synced_if_unchanged(id, updated_at).await
    }

    /// Apply newer remote fields to a synced replica unless it was edited
    /// after `updated_at`.
    ///
    /// Returns whether the replica was refreshed.
    pub async fn refresh_if_unchanged(
        &self,
        id: &NoteId,
        fields: &NoteFields,
        updated_at: i64,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.refresh_if_unchanged(id, fields, updated_at).await
    }

    /// Remove tombstones whose deletion has been confirmed remotely.
    pub async fn purge_confirmed_tombstones(&self, user_id: &str) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.purge_confirmed_tombstones(user_id).await
    }

    /// Create a note on this device without contacting the remote service.
    pub async fn create_offline(
        &self,
        user_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Replica> {
        let replica = Replica::new_offline(user_id, title, content);
        self.upsert(&replica).await?;
        tracing::debug!("Created offline replica {}", replica.id);
        Ok(replica)
    }

    /// Edit an active replica and mark it pending.
    pub async fn update_content(&self, id: &NoteId, title: &str, content: &str) -> Result<Replica> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.update_content(id, title, content, now_ms())
            .await?
            .ok_or_else(|| Error::NotFound(format!("Note {id} not found")))
    }

    /// Persist the remote timestamp of a detected conflict.
    pub async fn record_conflict(&self, id: &NoteId, remote_version: i64) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.record_conflict(id, remote_version).await
    }

    /// Open conflicts left by earlier passes.
    pub async fn list_conflicts(&self, user_id: &str) -> Result<Vec<Replica>> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.list_conflicts(user_id).await
    }

    /// Ids of every local replica, tombstones included.
    pub async fn replica_ids(&self, user_id: &str) -> Result<HashSet<NoteId>> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.replica_ids(user_id).await
    }

    /// Active replica ids starting with `prefix`.
    pub async fn list_ids_by_prefix(
        &self,
        user_id: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.list_ids_by_prefix(user_id, prefix, limit).await
    }
}
