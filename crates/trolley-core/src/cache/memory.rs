//! In-memory cache store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::CacheStore;
use crate::error::{Error, Result};

/// Cache store kept in process memory, with switchable failures for tests
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw value under `key`, bypassing failure injection.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Cache("cache read failed".to_string()));
        }
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Cache("cache write failed".to_string()));
        }
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_writes_leave_previous_value() {
        let store = MemoryCacheStore::new();
        store.set("key", "one").await.unwrap();

        store.fail_writes(true);
        assert!(store.set("key", "two").await.is_err());

        assert_eq!(store.peek("key").as_deref(), Some("one"));
        assert_eq!(store.write_count(), 1);
    }
}
