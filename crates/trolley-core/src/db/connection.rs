//! Database connection management

use crate::error::{Error, Result};
use crate::util::normalize_text_option;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;
use std::time::Duration;

use super::migrations;

const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Remote database the local replica follows
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote database URL (e.g., `libsql://lists.turso.io`)
    pub url: String,
    /// Authentication token for the remote database
    pub auth_token: String,
    /// Background sync interval; `None` means manual sync only
    pub sync_interval: Option<Duration>,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("url", &self.url)
            .field("auth_token", &"[REDACTED]")
            .field("sync_interval", &self.sync_interval)
            .finish()
    }
}

impl SyncConfig {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: auth_token.into(),
            sync_interval: Some(DEFAULT_SYNC_INTERVAL),
        }
    }

    /// Build a config only when both values are present and non-empty.
    pub fn from_parts(url: Option<String>, auth_token: Option<String>) -> Option<Self> {
        let url = normalize_text_option(url)?;
        let auth_token = normalize_text_option(auth_token)?;
        Some(Self::new(url, auth_token))
    }

    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    sync_config: Option<SyncConfig>,
}

impl Database {
    /// Open a local-only database at the given path, creating it if needed.
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let path_str = path.as_ref().to_string_lossy().to_string();
        Self::open_local(&path_str).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_local(":memory:").await
    }

    async fn open_local(path: &str) -> Result<Self> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            sync_config: None,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an embedded replica that follows a remote Turso database.
    ///
    /// Reads are served from the local file; writes go to the remote and sync back.
    pub async fn open_with_sync(
        local_path: impl AsRef<Path>,
        sync_config: SyncConfig,
    ) -> Result<Self> {
        if let Some(parent) = local_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let path_str = local_path.as_ref().to_string_lossy().to_string();
        if sync_config.url.trim().is_empty() {
            return Err(Error::Validation("Sync URL is required".into()));
        }

        let mut builder = Builder::new_remote_replica(
            &path_str,
            sync_config.url.clone(),
            sync_config.auth_token.clone(),
        );
        if let Some(interval) = sync_config.sync_interval {
            builder = builder.sync_interval(interval);
            tracing::debug!("Automatic sync interval set to {:?}", interval);
        }

        let db = builder.build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            sync_config: Some(sync_config),
        };

        // Pull the remote schema before migrating so we never fork it locally.
        tracing::debug!("Performing initial sync...");
        database.sync().await?;
        database.configure().await?;
        database.migrate().await?;

        Ok(database)
    }

    async fn configure(&self) -> Result<()> {
        // Remote replicas reject some pragmas; those failures are harmless.
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Pull changes from the remote database, if this is a replica.
    pub async fn sync(&self) -> Result<()> {
        if self.sync_config.is_some() {
            self.db.sync().await?;
            tracing::debug!("Database synced with remote");
        }
        Ok(())
    }

    pub const fn is_sync_enabled(&self) -> bool {
        self.sync_config.is_some()
    }

    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(!db.is_sync_enabled());
        db.sync().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("lists.db");
        let db = Database::open(&path).await.unwrap();
        assert!(!db.is_sync_enabled());
        assert!(path.exists());
    }

    #[test]
    fn sync_config_from_parts_requires_both_values() {
        assert!(SyncConfig::from_parts(None, Some("token".to_string())).is_none());
        assert!(
            SyncConfig::from_parts(Some("libsql://db.turso.io".to_string()), Some("  ".into()))
                .is_none()
        );
        let config = SyncConfig::from_parts(
            Some(" libsql://db.turso.io ".to_string()),
            Some(" token ".to_string()),
        )
        .unwrap();
        assert_eq!(config.url, "libsql://db.turso.io");
        assert_eq!(config.auth_token, "token");
        assert_eq!(config.sync_interval, Some(DEFAULT_SYNC_INTERVAL));
    }

    #[test]
    fn sync_config_debug_redacts_token() {
        let config = SyncConfig::new("libsql://db.turso.io", "secret-token").without_auto_sync();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
