//! libSQL-backed remote list source
//!
//! Backed by a [`Database`] that is either a local file or an embedded
//! replica of a remote Turso database. Subscriptions re-run the visibility
//! query whenever this handle writes or pulls fresh data with
//! [`LibSqlListStore::refresh`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::{
    ensure_owner, ensure_visible, spawn_snapshot_feed, ListSubscription, RemoteListSource,
};
use crate::db::{self, Database, LibSqlListRepository, SharedDatabase};
use crate::error::{Error, Result};
use crate::models::{Item, ListDraft, ListId, ShoppingList, UserId, UserProfile};

#[derive(Clone)]
pub struct LibSqlListStore {
    db: SharedDatabase,
    changes: Arc<watch::Sender<u64>>,
}

impl LibSqlListStore {
    pub fn new(db: SharedDatabase) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            db,
            changes: Arc::new(changes),
        }
    }

    pub fn from_database(database: Database) -> Self {
        Self::new(db::shared(database))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory().await?))
    }

    pub fn database(&self) -> SharedDatabase {
        Arc::clone(&self.db)
    }

    /// Pull remote changes into the replica and re-deliver every subscription.
    pub async fn refresh(&self) -> Result<()> {
        self.db
            .lock()
            .await
            .sync()
            .await
            .map_err(|error| Error::RemoteUnavailable(error.to_string()))?;
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        self.changes
            .send_modify(|version| *version = version.wrapping_add(1));
    }

    async fn require(repo: &LibSqlListRepository<'_>, id: &ListId) -> Result<ShoppingList> {
        repo.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

#[async_trait]
impl RemoteListSource for LibSqlListStore {
    async fn subscribe(&self, user: &UserId) -> Result<ListSubscription> {
        let db = Arc::clone(&self.db);
        let user = user.clone();
        Ok(spawn_snapshot_feed(self.changes.subscribe(), move || {
            let db = Arc::clone(&db);
            let user = user.clone();
            async move {
                let db = db.lock().await;
                LibSqlListRepository::new(db.connection())
                    .visible_to(&user)
                    .await
                    .map_err(|error| Error::RemoteUnavailable(error.to_string()))
            }
        }))
    }

    async fn create(&self, owner: &UserId, draft: &ListDraft) -> Result<ShoppingList> {
        let list = {
            let db = self.db.lock().await;
            LibSqlListRepository::new(db.connection())
                .insert(owner, draft)
                .await?
        };
        self.notify();
        Ok(list)
    }

    async fn fetch(&self, id: &ListId) -> Result<Option<ShoppingList>> {
        let db = self.db.lock().await;
        LibSqlListRepository::new(db.connection()).get(id).await
    }

    async fn update_contents(
        &self,
        actor: &UserId,
        id: &ListId,
        name: &str,
        items: &[Item],
    ) -> Result<()> {
        {
            let db = self.db.lock().await;
            let repo = LibSqlListRepository::new(db.connection());
            ensure_owner(&Self::require(&repo, id).await?, actor)?;
            repo.update_contents(id, name, items).await?;
        }
        self.notify();
        Ok(())
    }

    async fn replace_items(&self, actor: &UserId, id: &ListId, items: &[Item]) -> Result<()> {
        {
            let db = self.db.lock().await;
            let repo = LibSqlListRepository::new(db.connection());
            ensure_visible(&Self::require(&repo, id).await?, actor)?;
            repo.replace_items(id, items).await?;
        }
        self.notify();
        Ok(())
    }

    async fn delete(&self, actor: &UserId, id: &ListId) -> Result<()> {
        {
            let db = self.db.lock().await;
            let repo = LibSqlListRepository::new(db.connection());
            ensure_owner(&Self::require(&repo, id).await?, actor)?;
            repo.delete(id).await?;
        }
        self.notify();
        Ok(())
    }

    async fn add_shared_user(&self, actor: &UserId, id: &ListId, user: &UserId) -> Result<bool> {
        let added = {
            let db = self.db.lock().await;
            let repo = LibSqlListRepository::new(db.connection());
            let list = Self::require(&repo, id).await?;
            ensure_owner(&list, actor)?;
            if list.is_owned_by(user) {
                return Ok(false);
            }
            repo.add_share(id, user).await?
        };
        if added {
            self.notify();
        }
        Ok(added)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let db = self.db.lock().await;
        LibSqlListRepository::new(db.connection())
            .find_profile_by_email(email)
            .await
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlListRepository::new(db.connection())
            .upsert_profile(profile)
            .await
    }
}
