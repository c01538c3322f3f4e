//! Database layer for Trolley

mod cache_repository;
mod connection;
mod list_repository;
mod migrations;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use cache_repository::LibSqlCacheRepository;
pub use connection::{Database, SyncConfig};
pub use list_repository::LibSqlListRepository;

/// Database handle shared between stores.
pub type SharedDatabase = Arc<Mutex<Database>>;

pub fn shared(database: Database) -> SharedDatabase {
    Arc::new(Mutex::new(database))
}
