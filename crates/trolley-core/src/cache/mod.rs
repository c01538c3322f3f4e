//! Local cache store
//!
//! A key/value store holding one serialized snapshot of visible lists per
//! user. The cache is a disposable projection of the remote store: it is
//! written after every live snapshot and read only when the remote source
//! is unreachable.

mod libsql_store;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{ShoppingList, UserId};

pub use libsql_store::LibSqlCacheStore;
pub use memory::MemoryCacheStore;

/// Key/value storage for cached snapshots.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Cache key for a user's snapshot. Keys are per user so a snapshot left by
/// a previous user on the same device is never shown to the next one.
pub fn list_cache_key(user: &UserId) -> String {
    format!("shopping_lists_{user}")
}

/// Typed access to cached list snapshots
pub struct ListCache<C> {
    store: Arc<C>,
}

impl<C> Clone for ListCache<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<C: CacheStore> ListCache<C> {
    pub const fn new(store: Arc<C>) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &Arc<C> {
        &self.store
    }

    /// Load the cached snapshot for `user`. A missing entry is an empty list.
    pub async fn load(&self, user: &UserId) -> Result<Vec<ShoppingList>> {
        let raw = self
            .store
            .get(&list_cache_key(user))
            .await
            .map_err(into_cache_error)?;

        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|error| Error::Cache(format!("corrupt snapshot: {error}"))),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the cached snapshot for `user`.
    pub async fn save(&self, user: &UserId, lists: &[ShoppingList]) -> Result<()> {
        let raw = serde_json::to_string(lists)?;
        self.store
            .set(&list_cache_key(user), &raw)
            .await
            .map_err(into_cache_error)
    }
}

fn into_cache_error(error: Error) -> Error {
    match error {
        Error::Cache(_) => error,
        other => Error::Cache(other.to_string()),
    }
}
