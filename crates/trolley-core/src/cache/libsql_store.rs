//! libSQL-backed cache store

use async_trait::async_trait;

use super::CacheStore;
use crate::db::{self, Database, LibSqlCacheRepository, SharedDatabase};
use crate::error::Result;

/// Cache store over the `cache_entries` table of a local database.
///
/// Point this at a local-only database: the cache must stay writable while
/// the remote store is unreachable.
#[derive(Clone)]
pub struct LibSqlCacheStore {
    db: SharedDatabase,
}

impl LibSqlCacheStore {
    pub const fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub fn from_database(database: Database) -> Self {
        Self::new(db::shared(database))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory().await?))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlCacheRepository::new(db.connection()).remove(key).await
    }
}

#[async_trait]
impl CacheStore for LibSqlCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        LibSqlCacheRepository::new(db.connection()).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlCacheRepository::new(db.connection())
            .set(key, value)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ListCache;
    use crate::models::UserId;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cache.db");
        let alice = UserId::from("alice");

        {
            let store = LibSqlCacheStore::from_database(Database::open(&path).await.unwrap());
            ListCache::new(Arc::new(store))
                .save(&alice, &[])
                .await
                .unwrap();
        }

        let store = LibSqlCacheStore::from_database(Database::open(&path).await.unwrap());
        assert_eq!(
            store.get("shopping_lists_alice").await.unwrap().as_deref(),
            Some("[]")
        );
        store.remove("shopping_lists_alice").await.unwrap();
        assert!(store.get("shopping_lists_alice").await.unwrap().is_none());
    }
}
