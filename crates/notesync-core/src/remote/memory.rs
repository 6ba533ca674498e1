//! In-process notes backend with failure injection.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RemoteError, RemoteNotes, RemoteResult};
use crate::models::{NewNote, Note, NoteFields, NoteId};

/// A `RemoteNotes` implementation backed by a map.
///
/// Every operation can be made to fail on demand, writes can be made to fail
/// for individual notes, and each call is counted. An artificial latency can
/// be set to exercise deadlines.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    notes: Mutex<BTreeMap<NoteId, Note>>,
    failing_ids: Mutex<HashSet<NoteId>>,
    fail_fetch: AtomicBool,
    fail_insert: AtomicBool,
    fail_update: AtomicBool,
    fail_delete: AtomicBool,
    fail_get: AtomicBool,
    latency_ms: AtomicU64,
    fetch_count: AtomicUsize,
    insert_count: AtomicUsize,
    update_count: AtomicUsize,
    delete_count: AtomicUsize,
    get_count: AtomicUsize,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn notes(&self) -> MutexGuard<'_, BTreeMap<NoteId, Note>> {
        self.notes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failing_ids(&self) -> MutexGuard<'_, HashSet<NoteId>> {
        self.failing_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Place a record directly, as if another device had written it.
    pub fn seed(&self, note: Note) {
        self.notes().insert(note.id, note);
    }

    /// Build and place a record with an explicit creation timestamp.
    pub fn seed_with(
        &self,
        id: NoteId,
        user_id: &str,
        title: &str,
        content: &str,
        inserted_at: DateTime<Utc>,
    ) -> Note {
        let note = Note {
            id,
            title: title.to_string(),
            content: content.to_string(),
            user_id: user_id.to_string(),
            inserted_at,
        };
        self.seed(note.clone());
        note
    }

    /// Current state of one record.
    pub fn note(&self, id: &NoteId) -> Option<Note> {
        self.notes().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.notes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes().is_empty()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    /// Make insert, update and delete fail for one note only.
    pub fn fail_writes_for(&self, id: NoteId) {
        self.failing_ids().insert(id);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn insert_count(&self) -> usize {
        self.insert_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.get_count.load(Ordering::SeqCst)
    }

    /// Total write calls (insert, update and delete).
    pub fn write_count(&self) -> usize {
        self.insert_count() + self.update_count() + self.delete_count()
    }

    async fn simulate_latency(&self) {
        let millis = self.latency_ms.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    fn check_write(&self, flag: &AtomicBool, id: &NoteId, operation: &str) -> RemoteResult<()> {
        if flag.load(Ordering::SeqCst) || self.failing_ids().contains(id) {
            return Err(RemoteError::Unavailable(format!(
                "injected {operation} failure for {id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteNotes for InMemoryRemote {
    async fn fetch_all(&self, user_id: &str) -> RemoteResult<Vec<Note>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("injected fetch failure".to_string()));
        }
        Ok(self
            .notes()
            .values()
            .filter(|note| note.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, note: &NewNote) -> RemoteResult<Note> {
        self.insert_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_write(&self.fail_insert, &note.id, "insert")?;

        let mut notes = self.notes();
        if notes.contains_key(&note.id) {
            return Err(RemoteError::Api(format!(
                "duplicate key value violates unique constraint \"notes_pkey\" ({})",
                note.id
            )));
        }
        let stored = Note {
            id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            user_id: note.user_id.clone(),
            inserted_at: Utc::now(),
        };
        notes.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &NoteId, fields: &NoteFields) -> RemoteResult<()> {
        self.update_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_write(&self.fail_update, id, "update")?;

        // PostgREST treats an update that matches no row as success
        if let Some(note) = self.notes().get_mut(id) {
            note.title.clone_from(&fields.title);
            note.content.clone_from(&fields.content);
        }
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> RemoteResult<()> {
        self.delete_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_write(&self.fail_delete, id, "delete")?;

        self.notes().remove(id);
        Ok(())
    }

    async fn get_one(&self, id: &NoteId) -> RemoteResult<Option<Note>> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(format!(
                "injected get failure for {id}"
            )));
        }
        Ok(self.note(id))
    }
}
