//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for the local libSQL replica file
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open the local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically. Any failure to open or prepare the file
    /// is reported as [`Error::StorageUnavailable`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        Self::open_at(&path_str).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_at(":memory:").await
    }

    async fn open_at(location: &str) -> Result<Self> {
        let db = Builder::new_local(location)
            .build()
            .await
            .map_err(|error| storage_unavailable(location, &error))?;
        let conn = db
            .connect()
            .map_err(|error| storage_unavailable(location, &error))?;

        let database = Self { _db: db, conn };
        database
            .configure()
            .await
            .map_err(|error| storage_unavailable(location, &error))?;
        database
            .migrate()
            .await
            .map_err(|error| storage_unavailable(location, &error))?;
        Ok(database)
    }

    /// Configure `SQLite` for a single-writer local replica
    async fn configure(&self) -> Result<()> {
        // journal_mode returns a row; in-memory databases reject WAL
        self.conn
            .query("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA cache_size = 10000;", ())
            .await
            .ok();
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn storage_unavailable(location: &str, error: &dyn std::fmt::Display) -> Error {
    tracing::error!("Failed to open replica store at {}: {}", location, error);
    Error::StorageUnavailable(format!("{location}: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let val: i64 = row.get(0).unwrap();
        assert_eq!(val, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_file_is_idempotent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("replicas.db");

        drop(Database::open(&path).await.unwrap());
        let reopened = Database::open(&path).await.unwrap();

        let mut rows = reopened
            .connection()
            .query("SELECT COUNT(*) FROM replicas", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let count: i64 = row.get(0).unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_unwritable_location_is_storage_unavailable() {
        let tmp = tempdir().unwrap();
        // A directory cannot be opened as a database file
        let result = Database::open(tmp.path()).await;
        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
    }
}
