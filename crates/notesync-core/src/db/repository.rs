//! Replica repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{NoteFields, NoteId, Replica};
use libsql::{params, Connection, Value};

const REPLICA_COLUMNS: &str = "id, user_id, title, content, inserted_at, updated_at, is_synced, is_deleted, conflict_version";

/// Trait for replica storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ReplicaRepository {
    /// List non-tombstoned replicas for an owner, most recently updated first
    async fn list_active(&self, user_id: &str) -> Result<Vec<Replica>>;

    /// Get a replica by ID, tombstones included
    async fn get(&self, id: &NoteId) -> Result<Option<Replica>>;

    /// Get a non-tombstoned replica by ID
    async fn get_active(&self, id: &NoteId) -> Result<Option<Replica>>;

    /// Replace or insert a replica keyed by its ID
    async fn upsert(&self, replica: &Replica) -> Result<()>;

    /// Mark a replica deleted and pending; returns whether a row existed
    async fn tombstone(&self, id: &NoteId, now_ms: i64) -> Result<bool>;

    /// List replicas with pending obligations, tombstones included
    async fn list_unsynced(&self, user_id: &str) -> Result<Vec<Replica>>;

    /// Count replicas with pending obligations
    async fn count_unsynced(&self, user_id: &str) -> Result<usize>;

    /// Mark a replica synced and clear any recorded conflict
    async fn mark_synced(&self, id: &NoteId) -> Result<bool>;

    /// Mark a replica synced only if it has not been edited since `updated_at`
    async fn mark_synced_if_unchanged(&self, id: &NoteId, updated_at: i64) -> Result<bool>;

    /// Overwrite title and content of a synced, active replica that has not
    /// been edited since `updated_at`
    async fn refresh_if_unchanged(
        &self,
        id: &NoteId,
        fields: &NoteFields,
        updated_at: i64,
    ) -> Result<bool>;

    /// Physically remove tombstones whose deletion has been confirmed
    async fn purge_confirmed_tombstones(&self, user_id: &str) -> Result<u64>;

    /// Replace title and content of an active replica and mark it pending
    async fn update_content(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        now_ms: i64,
    ) -> Result<Option<Replica>>;

    /// Persist the remote timestamp of a detected conflict
    async fn record_conflict(&self, id: &NoteId, remote_version: i64) -> Result<()>;

    /// List active, pending replicas that carry a recorded conflict
    async fn list_conflicts(&self, user_id: &str) -> Result<Vec<Replica>>;

    /// IDs of every local replica for an owner, tombstones included
    async fn replica_ids(&self, user_id: &str) -> Result<HashSet<NoteId>>;

    /// IDs of active replicas starting with `prefix`, most recent first
    async fn list_ids_by_prefix(
        &self,
        user_id: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>>;
}

/// libSQL implementation of `ReplicaRepository`
pub struct LibSqlReplicaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlReplicaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a replica from a database row
    fn parse_replica(row: &libsql::Row) -> Result<Replica> {
        let id: String = row.get(0)?;
        let id = id
            .parse()
            .map_err(|_| Error::Database(format!("invalid replica id in store: {id}")))?;
        let conflict_version = match row.get_value(8)? {
            Value::Integer(version) => Some(version),
            _ => None,
        };

        Ok(Replica {
            id,
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            inserted_at: row.get(4)?,
            updated_at: row.get(5)?,
            is_synced: row.get::<i64>(6)? != 0,
            is_deleted: row.get::<i64>(7)? != 0,
            conflict_version,
        })
    }

    async fn query_replicas(&self, sql: &str, user_id: &str) -> Result<Vec<Replica>> {
        let mut rows = self.conn.query(sql, [user_id]).await?;

        let mut replicas = Vec::new();
        while let Some(row) = rows.next().await? {
            replicas.push(Self::parse_replica(&row)?);
        }
        Ok(replicas)
    }

    async fn query_one(&self, sql: &str, id: &NoteId) -> Result<Option<Replica>> {
        let mut rows = self.conn.query(sql, [id.as_str()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_replica(&row)?)),
            None => Ok(None),
        }
    }
}

impl ReplicaRepository for LibSqlReplicaRepository<'_> {
    async fn list_active(&self, user_id: &str) -> Result<Vec<Replica>> {
        self.query_replicas(
            &format!(
                "SELECT {REPLICA_COLUMNS}
                 FROM replicas
                 WHERE user_id = ? AND is_deleted = 0
                 ORDER BY updated_at DESC"
            ),
            user_id,
        )
        .await
    }

    async fn get(&self, id: &NoteId) -> Result<Option<Replica>> {
        self.query_one(
            &format!("SELECT {REPLICA_COLUMNS} FROM replicas WHERE id = ?"),
            id,
        )
        .await
    }

    async fn get_active(&self, id: &NoteId) -> Result<Option<Replica>> {
        self.query_one(
            &format!("SELECT {REPLICA_COLUMNS} FROM replicas WHERE id = ? AND is_deleted = 0"),
            id,
        )
        .await
    }

    async fn upsert(&self, replica: &Replica) -> Result<()> {
        let conflict_version = replica
            .conflict_version
            .map_or(Value::Null, Value::Integer);

        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO replicas ({REPLICA_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    replica.id.as_str(),
                    replica.user_id.as_str(),
                    replica.title.as_str(),
                    replica.content.as_str(),
                    replica.inserted_at,
                    replica.updated_at,
                    i64::from(replica.is_synced),
                    i64::from(replica.is_deleted),
                    conflict_version
                ],
            )
            .await?;
        Ok(())
    }

    async fn tombstone(&self, id: &NoteId, now_ms: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE replicas
                 SET is_deleted = 1, is_synced = 0, updated_at = ?
                 WHERE id = ?",
                params![now_ms, id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn list_unsynced(&self, user_id: &str) -> Result<Vec<Replica>> {
        self.query_replicas(
            &format!(
                "SELECT {REPLICA_COLUMNS}
                 FROM replicas
                 WHERE user_id = ? AND is_synced = 0
                 ORDER BY updated_at ASC"
            ),
            user_id,
        )
        .await
    }

    async fn count_unsynced(&self, user_id: &str) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM replicas WHERE user_id = ? AND is_synced = 0",
                [user_id],
            )
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid count {count}")))
    }

    async fn mark_synced(&self, id: &NoteId) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE replicas SET is_synced = 1, conflict_version = NULL WHERE id = ?",
                [id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn mark_synced_if_unchanged(&self, id: &NoteId, updated_at: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE replicas
                 SET is_synced = 1, conflict_version = NULL
                 WHERE id = ? AND updated_at = ?",
                params![id.as_str(), updated_at],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn refresh_if_unchanged(
        &self,
        id: &NoteId,
        fields: &NoteFields,
        updated_at: i64,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE replicas
                 SET title = ?, content = ?
                 WHERE id = ? AND updated_at = ? AND is_synced = 1 AND is_deleted = 0",
                params![
                    fields.title.as_str(),
                    fields.content.as_str(),
                    id.as_str(),
                    updated_at
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn purge_confirmed_tombstones(&self, user_id: &str) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM replicas WHERE user_id = ? AND is_deleted = 1 AND is_synced = 1",
                [user_id],
            )
            .await?;
        Ok(rows)
    }

    async fn update_content(
        &self,
        id: &NoteId,
        title: &str,
        content: &str,
        now_ms: i64,
    ) -> Result<Option<Replica>> {
        let rows = self
            .conn
            .execute(
                "UPDATE replicas
                 SET title = ?, content = ?, updated_at = ?, is_synced = 0
                 WHERE id = ? AND is_deleted = 0",
                params![title, content, now_ms, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Ok(None);
        }
        self.get_active(id).await
    }

    async fn record_conflict(&self, id: &NoteId, remote_version: i64) -> Result<()> {
        self.conn
            .execute(
                "UPDATE replicas SET conflict_version = ? WHERE id = ?",
                params![remote_version, id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn list_conflicts(&self, user_id: &str) -> Result<Vec<Replica>> {
        self.query_replicas(
            &format!(
                "SELECT {REPLICA_COLUMNS}
                 FROM replicas
                 WHERE user_id = ? AND is_synced = 0 AND is_deleted = 0
                   AND conflict_version IS NOT NULL
                 ORDER BY updated_at DESC"
            ),
            user_id,
        )
        .await
    }

    async fn replica_ids(&self, user_id: &str) -> Result<HashSet<NoteId>> {
        let mut rows = self
            .conn
            .query("SELECT id FROM replicas WHERE user_id = ?", [user_id])
            .await?;

        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let id = id
                .parse()
                .map_err(|_| Error::Database(format!("invalid replica id in store: {id}")))?;
            ids.insert(id);
        }
        Ok(ids)
    }

    async fn list_ids_by_prefix(
        &self,
        user_id: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id
                 FROM replicas
                 WHERE user_id = ? AND is_deleted = 0 AND substr(id, 1, length(?)) = ?
                 ORDER BY updated_at DESC
                 LIMIT ?",
                params![user_id, prefix, prefix, limit as i64],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn replica(user_id: &str, title: &str, updated_at: i64) -> Replica {
        let mut replica = Replica::new_offline(user_id, title, format!("{title} body"));
        replica.inserted_at = updated_at;
        replica.updated_at = updated_at;
        replica
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_get_roundtrip() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let mut original = replica("user-1", "First", 1_000);
        original.conflict_version = Some(2_000);
        repo.upsert(&original).await.unwrap();

        let fetched = repo.get(&original.id).await.unwrap().unwrap();
        assert_eq!(fetched, original);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_replaces_whole_row() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let mut original = replica("user-1", "First", 1_000);
        repo.upsert(&original).await.unwrap();

        original.title = "Replaced".to_string();
        original.is_synced = true;
        repo.upsert(&original).await.unwrap();

        let all = repo.list_active("user-1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Replaced");
        assert!(all[0].is_synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_active_is_newest_first_and_scoped_to_owner() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        repo.upsert(&replica("user-1", "Old", 1_000)).await.unwrap();
        repo.upsert(&replica("user-1", "New", 3_000)).await.unwrap();
        repo.upsert(&replica("user-1", "Mid", 2_000)).await.unwrap();
        repo.upsert(&replica("user-2", "Foreign", 4_000))
            .await
            .unwrap();

        let titles = repo
            .list_active("user-1")
            .await
            .unwrap()
            .into_iter()
            .map(|replica| replica.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["New", "Mid", "Old"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tombstone_hides_from_active_but_stays_unsynced() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let mut note = replica("user-1", "Doomed", 1_000);
        note.is_synced = true;
        repo.upsert(&note).await.unwrap();

        assert!(repo.tombstone(&note.id, 5_000).await.unwrap());

        assert!(repo.list_active("user-1").await.unwrap().is_empty());
        assert!(repo.get_active(&note.id).await.unwrap().is_none());

        let unsynced = repo.list_unsynced("user-1").await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert!(unsynced[0].is_deleted);
        assert_eq!(unsynced[0].updated_at, 5_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tombstone_missing_replica_is_noop() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        assert!(!repo.tombstone(&NoteId::new(), 5_000).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_clears_conflict() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let note = replica("user-1", "Pending", 1_000);
        repo.upsert(&note).await.unwrap();
        repo.record_conflict(&note.id, 9_000).await.unwrap();
        assert_eq!(repo.list_conflicts("user-1").await.unwrap().len(), 1);

        assert!(repo.mark_synced(&note.id).await.unwrap());

        let fetched = repo.get(&note.id).await.unwrap().unwrap();
        assert!(fetched.is_synced);
        assert_eq!(fetched.conflict_version, None);
        assert_eq!(repo.count_unsynced("user-1").await.unwrap(), 0);
        assert!(!repo.mark_synced(&NoteId::new()).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_synced_if_unchanged_skips_newer_edit() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let note = replica("user-1", "Racing", 1_000);
        repo.upsert(&note).await.unwrap();
        repo.update_content(&note.id, "Edited", "again", 2_000)
            .await
            .unwrap();

        assert!(!repo.mark_synced_if_unchanged(&note.id, 1_000).await.unwrap());
        assert!(repo.mark_synced_if_unchanged(&note.id, 2_000).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_refresh_if_unchanged_keeps_local_edit() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let mut note = replica("user-1", "Shared", 1_000);
        note.is_synced = true;
        repo.upsert(&note).await.unwrap();
        let incoming = NoteFields::new("Shared", "from remote");

        repo.update_content(&note.id, "Shared", "local edit", 1_000)
            .await
            .unwrap();
        assert!(!repo
            .refresh_if_unchanged(&note.id, &incoming, 1_000)
            .await
            .unwrap());
        let kept = repo.get(&note.id).await.unwrap().unwrap();
        assert_eq!(kept.content, "local edit");
        assert!(!kept.is_synced);

        repo.mark_synced(&note.id).await.unwrap();
        assert!(repo
            .refresh_if_unchanged(&note.id, &incoming, 1_000)
            .await
            .unwrap());
        let refreshed = repo.get(&note.id).await.unwrap().unwrap();
        assert_eq!(refreshed.content, "from remote");
        assert_eq!(refreshed.updated_at, 1_000);
        assert!(refreshed.is_synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_purge_removes_only_confirmed_tombstones() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let confirmed = replica("user-1", "Confirmed", 1_000);
        let pending = replica("user-1", "Pending", 1_000);
        let alive = replica("user-1", "Alive", 1_000);
        for note in [&confirmed, &pending, &alive] {
            repo.upsert(note).await.unwrap();
        }
        repo.tombstone(&confirmed.id, 2_000).await.unwrap();
        repo.mark_synced(&confirmed.id).await.unwrap();
        repo.tombstone(&pending.id, 2_000).await.unwrap();

        assert_eq!(repo.purge_confirmed_tombstones("user-1").await.unwrap(), 1);

        assert!(repo.get(&confirmed.id).await.unwrap().is_none());
        assert!(repo.get(&pending.id).await.unwrap().is_some());
        assert!(repo.get(&alive.id).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_content_marks_pending() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let mut note = replica("user-1", "Before", 1_000);
        note.is_synced = true;
        repo.upsert(&note).await.unwrap();

        let updated = repo
            .update_content(&note.id, "After", "new body", 4_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "After");
        assert_eq!(updated.content, "new body");
        assert_eq!(updated.updated_at, 4_000);
        assert!(!updated.is_synced);

        repo.tombstone(&note.id, 5_000).await.unwrap();
        assert!(repo
            .update_content(&note.id, "Ghost", "", 6_000)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replica_ids_include_tombstones() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let alive = replica("user-1", "Alive", 1_000);
        let dead = replica("user-1", "Dead", 1_000);
        repo.upsert(&alive).await.unwrap();
        repo.upsert(&dead).await.unwrap();
        repo.tombstone(&dead.id, 2_000).await.unwrap();

        let ids = repo.replica_ids("user-1").await.unwrap();
        assert!(ids.contains(&alive.id));
        assert!(ids.contains(&dead.id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_ids_by_prefix() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());

        let mut note_a = replica("user-1", "A", 1_000);
        note_a.id = "aaaaaaaa-aaaa-4aaa-8aaa-111111111111".parse().unwrap();
        let mut note_b = replica("user-1", "B", 2_000);
        note_b.id = "aaaaaaaa-aaaa-4aaa-8aaa-222222222222".parse().unwrap();
        repo.upsert(&note_a).await.unwrap();
        repo.upsert(&note_b).await.unwrap();

        let both = repo
            .list_ids_by_prefix("user-1", "aaaaaaaa", 3)
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[0], note_b.id.as_str());

        let one = repo
            .list_ids_by_prefix("user-1", "aaaaaaaa-aaaa-4aaa-8aaa-1", 3)
            .await
            .unwrap();
        assert_eq!(one, vec![note_a.id.as_str()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_ids_by_prefix_treats_input_literally() {
        let db = setup().await;
        let repo = LibSqlReplicaRepository::new(db.connection());
        repo.upsert(&replica("user-1", "A", 1_000)).await.unwrap();

        for pattern in ["%", "_", "%%%%", "\\"] {
            let matches = repo
                .list_ids_by_prefix("user-1", pattern, 3)
                .await
                .unwrap();
            assert!(matches.is_empty(), "{pattern} matched {matches:?}");
        }
    }
}
