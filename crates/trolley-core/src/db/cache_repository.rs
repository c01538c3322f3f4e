//! Cache entry repository implementation

use crate::error::Result;
use crate::util::unix_millis_now;
use libsql::{params, Connection};

/// libSQL-backed key/value storage for cached snapshots
pub struct LibSqlCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCacheRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM cache_entries WHERE key = ?", [key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Whole-value replace for `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO cache_entries (key, value, updated_at) VALUES (?, ?, ?)",
                params![key, value, unix_millis_now()],
            )
            .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM cache_entries WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_key_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlCacheRepository::new(db.connection());

        assert_eq!(repo.get("shopping_lists_alice").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_replaces_previous_value() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlCacheRepository::new(db.connection());

        repo.set("shopping_lists_alice", "[1]").await.unwrap();
        repo.set("shopping_lists_alice", "[2]").await.unwrap();

        assert_eq!(
            repo.get("shopping_lists_alice").await.unwrap().as_deref(),
            Some("[2]")
        );

        repo.remove("shopping_lists_alice").await.unwrap();
        assert_eq!(repo.get("shopping_lists_alice").await.unwrap(), None);
    }
}
