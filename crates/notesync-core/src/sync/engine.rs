//! Reconciliation passes between the replica store and the remote service.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use super::feed::ChangeEvent;
use super::resolve::{ConflictDecision, ConflictResolver};
use super::status::{StatusNotifier, SyncStatus};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::{Note, NoteId, Replica};
use crate::remote::{RemoteError, RemoteNotes, RemoteResult};
use crate::services::ReplicaStore;

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Replicas left unsynced because the remote record is newer and differs
    pub conflicts: Vec<Replica>,
    /// Local changes (edits and deletions) confirmed by the remote service
    pub synced_count: usize,
    /// Remote-only records materialized locally
    pub pulled_count: usize,
    /// Synced replicas overwritten by newer remote content
    pub refreshed_count: usize,
    /// Confirmed tombstones removed from the store
    pub purged_count: u64,
}

impl SyncOutcome {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Clears the in-flight flag when a pass ends, however it ends
struct PassGuard<'a>(&'a AtomicBool);

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Synchronization session over one replica store and one remote backend.
///
/// At most one pass runs at a time per engine; wrap the engine in an `Arc`
/// to share it between the periodic loop, the change-feed consumer and the
/// UI.
pub struct SyncEngine {
    store: ReplicaStore,
    remote: Arc<dyn RemoteNotes>,
    config: SyncConfig,
    status: StatusNotifier,
    resolver: ConflictResolver,
    in_flight: AtomicBool,
}

impl SyncEngine {
    pub fn new(store: ReplicaStore, remote: Arc<dyn RemoteNotes>, config: SyncConfig) -> Self {
        let resolver = ConflictResolver::new(store.clone(), Arc::clone(&remote), config.call_timeout);
        Self {
            store,
            remote,
            config,
            status: StatusNotifier::new(),
            resolver,
            in_flight: AtomicBool::new(false),
        }
    }

    pub const fn store(&self) -> &ReplicaStore {
        &self.store
    }

    pub const fn status(&self) -> &StatusNotifier {
        &self.status
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one reconciliation pass for `user_id`.
    ///
    /// Returns an empty outcome immediately when another pass is already
    /// running on this engine.
    pub async fn synchronize(&self, user_id: &str) -> Result<SyncOutcome> {
        let Some(_guard) = PassGuard::acquire(&self.in_flight) else {
            tracing::debug!("Sync pass already in progress; skipping");
            return Ok(SyncOutcome::default());
        };

        self.publish_status(user_id, true).await;
        let result = self.run_pass(user_id).await;
        self.publish_status(user_id, false).await;

        match &result {
            Ok(outcome) => tracing::info!(
                "Sync pass for {} finished: {} synced, {} pulled, {} refreshed, {} purged, {} conflicts",
                user_id,
                outcome.synced_count,
                outcome.pulled_count,
                outcome.refreshed_count,
                outcome.purged_count,
                outcome.conflicts.len()
            ),
            Err(error) => tracing::warn!("Sync pass for {} failed: {}", user_id, error),
        }
        result
    }

    async fn run_pass(&self, user_id: &str) -> Result<SyncOutcome> {
        let snapshot = self.fetch_snapshot(user_id).await?;
        let pending = self.store.list_unsynced(user_id).await?;
        tracing::debug!(
            "Reconciling {} pending replicas against {} remote notes",
            pending.len(),
            snapshot.len()
        );

        let mut outcome = SyncOutcome::default();
        let mut touched = HashSet::with_capacity(pending.len());

        for mut local in pending {
            touched.insert(local.id);
            let remote = snapshot.get(&local.id);

            if local.is_deleted {
                if self.propagate_delete(&local, remote.is_some()).await? {
                    outcome.synced_count += 1;
                }
                continue;
            }

            if let Some(remote) = remote.filter(|remote| is_conflict(&local, remote)) {
                let remote_version = remote.inserted_at_ms();
                tracing::debug!(
                    "Conflict on note {}: remote {} is newer than local {}",
                    local.id,
                    remote_version,
                    local.updated_at
                );
                self.store.record_conflict(&local.id, remote_version).await?;
                local.conflict_version = Some(remote_version);
                outcome.conflicts.push(local);
                continue;
            }

            if self.push(&local, remote.is_some()).await? {
                outcome.synced_count += 1;
            }
        }

        self.pull(user_id, &snapshot, &touched, &mut outcome)
            .await?;
        outcome.purged_count = self.store.purge_confirmed_tombstones(user_id).await?;
        Ok(outcome)
    }

    async fn fetch_snapshot(&self, user_id: &str) -> Result<HashMap<NoteId, Note>> {
        let fetched = tokio::time::timeout(self.config.snapshot_timeout, self.remote.fetch_all(user_id))
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(self.config.snapshot_timeout)));

        let notes = fetched.map_err(|error| {
            tracing::warn!("Failed to fetch remote notes for {}: {}", user_id, error);
            Error::SnapshotFetchFailed(error)
        })?;
        Ok(notes.into_iter().map(|note| (note.id, note)).collect())
    }

    /// Returns whether the tombstone was confirmed.
    async fn propagate_delete(&self, local: &Replica, exists_remotely: bool) -> Result<bool> {
        if exists_remotely {
            if let Err(error) = self.call(self.remote.delete(&local.id)).await {
                tracing::warn!("Failed to delete note {} remotely: {}", local.id, error);
                return Ok(false);
            }
        }

        tracing::debug!("Deletion of note {} confirmed", local.id);
        self.store.mark_synced(&local.id).await?;
        Ok(true)
    }

    /// Returns whether the replica was marked synced.
    async fn push(&self, local: &Replica, exists_remotely: bool) -> Result<bool> {
        let pushed = if exists_remotely {
            self.call(self.remote.update(&local.id, &local.fields()))
                .await
        } else {
            self.call(self.remote.insert(&local.to_new_note()))
                .await
                .map(|_| ())
        };

        if let Err(error) = pushed {
            tracing::warn!("Failed to push note {}: {}", local.id, error);
            return Ok(false);
        }

        let marked = self
            .store
            .mark_synced_if_unchanged(&local.id, local.updated_at)
            .await?;
        if marked {
            tracing::debug!("Pushed note {}", local.id);
        } else {
            tracing::debug!("Note {} changed during push; it stays pending", local.id);
        }
        Ok(marked)
    }

    async fn pull(
        &self,
        user_id: &str,
        snapshot: &HashMap<NoteId, Note>,
        touched: &HashSet<NoteId>,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let known = self.store.replica_ids(user_id).await?;
        let active: HashMap<NoteId, Replica> = self
            .store
            .list_active(user_id)
            .await?
            .into_iter()
            .map(|replica| (replica.id, replica))
            .collect();

        for note in snapshot.values() {
            if !known.contains(&note.id) {
                tracing::debug!("Pulled remote note {}", note.id);
                self.store.upsert(&Replica::from_remote(note)).await?;
                outcome.pulled_count += 1;
                continue;
            }
            if touched.contains(&note.id) {
                continue;
            }

            let Some(local) = active.get(&note.id) else {
                continue;
            };
            if !local.is_synced || !local.differs_from(note) {
                continue;
            }
            if self
                .store
                .refresh_if_unchanged(&note.id, &note.fields(), local.updated_at)
                .await?
            {
                tracing::debug!("Refreshed note {} from remote", note.id);
                outcome.refreshed_count += 1;
            } else {
                tracing::debug!("Note {} was edited locally; skipping refresh", note.id);
            }
        }
        Ok(())
    }

    async fn call<T>(&self, request: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        tokio::time::timeout(self.config.call_timeout, request)
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(self.config.call_timeout)))
    }

    async fn publish_status(&self, user_id: &str, is_syncing: bool) {
        let pending_changes = match self.store.count_unsynced(user_id).await {
            Ok(count) => count,
            Err(error) => {
                tracing::warn!("Failed to count pending changes: {}", error);
                self.status.current().pending_changes
            }
        };
        self.status.publish(SyncStatus {
            is_syncing,
            pending_changes,
        });
    }

    async fn refresh_status(&self, user_id: &str) {
        self.publish_status(user_id, self.is_syncing()).await;
    }

    /// Commit a conflict decision and republish the status.
    pub async fn resolve(
        &self,
        decision: &ConflictDecision,
        user_id: &str,
    ) -> Result<Option<Replica>> {
        let result = self.resolver.resolve(decision, user_id).await;
        self.refresh_status(user_id).await;
        result
    }

    /// Create a note offline and republish the status.
    pub async fn create_offline(&self, user_id: &str, title: &str, content: &str) -> Result<Replica> {
        let replica = self.store.create_offline(user_id, title, content).await?;
        self.refresh_status(user_id).await;
        Ok(replica)
    }

    /// Edit a note offline and republish the status.
    pub async fn update_content(
        &self,
        user_id: &str,
        id: &NoteId,
        title: &str,
        content: &str,
    ) -> Result<Replica> {
        let replica = self.store.update_content(id, title, content).await?;
        self.refresh_status(user_id).await;
        Ok(replica)
    }

    /// Tombstone a note and republish the status.
    pub async fn delete(&self, user_id: &str, id: &NoteId) -> Result<()> {
        self.store.tombstone(id).await?;
        self.refresh_status(user_id).await;
        Ok(())
    }

    /// Apply one realtime change to the store.
    ///
    /// Inserts and updates of notes owned by `user_id` overwrite the local
    /// replica with a synced copy. A deletion removes the replica outright.
    pub async fn apply_change(&self, user_id: &str, event: ChangeEvent) -> Result<()> {
        match event {
            ChangeEvent::Insert(note) | ChangeEvent::Update(note) => {
                if note.user_id != user_id {
                    tracing::debug!("Ignoring change to note {} of another owner", note.id);
                    return Ok(());
                }
                tracing::debug!("Applying remote change to note {}", note.id);
                self.store.upsert(&Replica::from_remote(&note)).await?;
            }
            ChangeEvent::Delete { id } => {
                let Some(local) = self.store.get(&id).await? else {
                    tracing::debug!("Remote deletion of unknown note {}", id);
                    return Ok(());
                };
                if local.user_id != user_id {
                    tracing::debug!("Ignoring deletion of note {} of another owner", id);
                    return Ok(());
                }
                tracing::debug!("Applying remote deletion of note {}", id);
                self.store.tombstone(&id).await?;
                self.store.mark_synced(&id).await?;
                self.store.purge_confirmed_tombstones(user_id).await?;
            }
        }
        self.refresh_status(user_id).await;
        Ok(())
    }

    /// Apply change events until every sender is dropped.
    ///
    /// A failed event is logged and skipped.
    pub async fn consume_changes(&self, user_id: &str, mut changes: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = changes.recv().await {
            let id = event.note_id();
            if let Err(error) = self.apply_change(user_id, event).await {
                tracing::warn!("Failed to apply remote change to note {}: {}", id, error);
            }
        }
        tracing::debug!("Change feed for {} closed", user_id);
    }

    /// Run a pass every `sync_interval`, starting immediately, until
    /// `shutdown` becomes `true` or its sender is dropped.
    ///
    /// Failed passes are logged and retried on the next tick. Returns the
    /// number of passes attempted.
    pub async fn run_periodic(&self, user_id: &str, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = tokio::time::interval(self.config.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    passes += 1;
                    if let Err(error) = self.synchronize(user_id).await {
                        tracing::warn!("Periodic sync pass failed: {}", error);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Periodic sync for {} stopped after {} passes", user_id, passes);
        passes
    }
}

/// The remote record was created after the local edit and holds different
/// fields. Equal timestamps are not a conflict.
fn is_conflict(local: &Replica, remote: &Note) -> bool {
    remote.inserted_at_ms() > local.updated_at && local.differs_from(remote)
}
