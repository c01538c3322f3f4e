//! Remote list source
//!
//! The authoritative store of list documents. Every implementation filters
//! queries to lists the user owns or has been granted, delivers full result
//! sets through a [`ListSubscription`], and enforces ownership on writes the
//! way a hosted document store's access rules would.

mod libsql_store;
mod memory;

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::models::{Item, ListDraft, ListId, ShoppingList, UserId, UserProfile};

pub use libsql_store::LibSqlListStore;
pub use memory::MemoryListStore;

const SNAPSHOT_BUFFER: usize = 16;

/// A subscription-capable store of shopping list documents.
#[async_trait]
pub trait RemoteListSource: Send + Sync {
    /// Subscribe to the lists visible to `user`. The first delivery is the
    /// current result set; every later change delivers the full set again.
    async fn subscribe(&self, user: &UserId) -> Result<ListSubscription>;

    /// Create a document owned by `owner` with server-assigned id and timestamps.
    async fn create(&self, owner: &UserId, draft: &ListDraft) -> Result<ShoppingList>;

    /// Fresh read of one document.
    async fn fetch(&self, id: &ListId) -> Result<Option<ShoppingList>>;

    /// Rewrite name and items. Owner only.
    async fn update_contents(
        &self,
        actor: &UserId,
        id: &ListId,
        name: &str,
        items: &[Item],
    ) -> Result<()>;

    /// Rewrite the full items array. Any user the list is visible to.
    async fn replace_items(&self, actor: &UserId, id: &ListId, items: &[Item]) -> Result<()>;

    /// Delete a document. Owner only; a missing document is `NotFound`.
    async fn delete(&self, actor: &UserId, id: &ListId) -> Result<()>;

    /// Atomically add `user` to the share set. Owner only.
    ///
    /// Returns false when `user` already had access.
    async fn add_shared_user(&self, actor: &UserId, id: &ListId, user: &UserId) -> Result<bool>;

    /// Look up a user in the directory by normalized e-mail.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>>;

    /// Register or refresh a directory entry.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()>;
}

type Delivery = Result<Vec<ShoppingList>>;

/// A live query. Cancelled explicitly or on drop.
#[derive(Debug)]
pub struct ListSubscription {
    receiver: mpsc::Receiver<Delivery>,
    task: Option<JoinHandle<()>>,
}

impl ListSubscription {
    pub const fn new(receiver: mpsc::Receiver<Delivery>, task: JoinHandle<()>) -> Self {
        Self {
            receiver,
            task: Some(task),
        }
    }

    /// Next delivery; `None` once the feed has closed.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.receiver.close();
    }

    pub const fn is_cancelled(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for ListSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Drive a subscription from a change counter: deliver `fetch()` now and
/// again after every change. The feed stops after delivering an error.
pub(crate) fn spawn_snapshot_feed<F, Fut>(
    mut changes: watch::Receiver<u64>,
    fetch: F,
) -> ListSubscription
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Delivery> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
    let task = tokio::spawn(async move {
        loop {
            drop(changes.borrow_and_update());
            let delivery = fetch().await;
            let failed = delivery.is_err();
            if sender.send(delivery).await.is_err() || failed {
                break;
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    });
    ListSubscription::new(receiver, task)
}

pub(crate) fn ensure_owner(list: &ShoppingList, actor: &UserId) -> Result<()> {
    if list.is_owned_by(actor) {
        Ok(())
    } else {
        Err(Error::Permission(format!(
            "{actor} does not own list {}",
            list.id
        )))
    }
}

pub(crate) fn ensure_visible(list: &ShoppingList, actor: &UserId) -> Result<()> {
    if list.is_visible_to(actor) {
        Ok(())
    } else {
        Err(Error::Permission(format!(
            "list {} is not shared with {actor}",
            list.id
        )))
    }
}
