//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: replica table and its secondary indexes
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS replicas (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            inserted_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            is_synced INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            conflict_version INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_replicas_user ON replicas(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_replicas_synced ON replicas(is_synced)",
        "CREATE INDEX IF NOT EXISTS idx_replicas_deleted ON replicas(is_deleted)",
        "CREATE INDEX IF NOT EXISTS idx_replicas_updated ON replicas(updated_at DESC)",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated replica store to version {CURRENT_VERSION}");
    Ok(())
}
