//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// Version 1: list documents, share membership, and the user directory
const V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS shopping_lists (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        items TEXT NOT NULL DEFAULT '[]',
        owner_id TEXT NOT NULL,
        visibility TEXT NOT NULL DEFAULT 'private',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_shopping_lists_owner ON shopping_lists(owner_id)",
    // One row per grant; the primary key makes sharing an atomic set union.
    "CREATE TABLE IF NOT EXISTS list_shares (
        list_id TEXT NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL,
        granted_at INTEGER NOT NULL,
        PRIMARY KEY (list_id, user_id)
    )",
    "CREATE INDEX IF NOT EXISTS idx_list_shares_user ON list_shares(user_id)",
    "CREATE TABLE IF NOT EXISTS user_profiles (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL DEFAULT ''
    )",
];

/// Version 2: key-value cache entries (local only)
const V2: &[&str] = &["CREATE TABLE IF NOT EXISTS cache_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )"];

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, V1).await?;
    }
    if version < 2 {
        apply(conn, 2, V2).await?;
    }

    Ok(())
}

async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists = match rows.next().await? {
        Some(row) => row.get::<i32>(0)? != 0,
        None => false,
    };
    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i32>(0)?),
        None => Ok(0),
    }
}

/// Run one migration's statements in a single transaction and record its version.
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }
    if let Err(e) = conn
        .execute(
            "INSERT INTO schema_version (version) VALUES (?)",
            libsql::params![i64::from(version)],
        )
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}
