//! In-memory remote list source

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{
    ensure_owner, ensure_visible, spawn_snapshot_feed, ListSubscription, RemoteListSource,
};
use crate::error::{Error, Result};
use crate::models::{Item, ListDraft, ListId, ShoppingList, UserId, UserProfile};
use crate::util::unix_millis_now;

#[derive(Debug, Default)]
struct Failures {
    subscriptions: Option<String>,
    writes: Option<String>,
}

#[derive(Debug)]
struct Inner {
    lists: Mutex<Vec<ShoppingList>>,
    profiles: Mutex<HashMap<String, UserProfile>>,
    failures: Mutex<Failures>,
    changes: watch::Sender<u64>,
    write_attempts: AtomicUsize,
}

/// A remote store held in process memory.
///
/// Clones share the same documents, so two sessions built on clones see each
/// other's writes. Failures can be switched on to exercise fallback paths.
#[derive(Debug, Clone)]
pub struct MemoryListStore {
    inner: Arc<Inner>,
}

impl Default for MemoryListStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryListStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                lists: Mutex::new(Vec::new()),
                profiles: Mutex::new(HashMap::new()),
                failures: Mutex::new(Failures::default()),
                changes,
                write_attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// Make new and live subscriptions fail with `message`.
    pub fn fail_subscriptions(&self, message: impl Into<String>) {
        lock(&self.inner.failures).subscriptions = Some(message.into());
        self.inner.notify();
    }

    /// Make every write fail with `message`.
    pub fn fail_writes(&self, message: impl Into<String>) {
        lock(&self.inner.failures).writes = Some(message.into());
    }

    pub fn clear_failures(&self) {
        *lock(&self.inner.failures) = Failures::default();
    }

    /// Number of write calls received, failed or not.
    pub fn write_attempts(&self) -> usize {
        self.inner.write_attempts.load(Ordering::SeqCst)
    }

    /// Every stored document, regardless of visibility.
    pub fn documents(&self) -> Vec<ShoppingList> {
        lock(&self.inner.lists).clone()
    }

    /// Store a document as-is, bypassing validation and access rules.
    pub fn insert_raw(&self, list: ShoppingList) {
        lock(&self.inner.lists).push(list);
        self.inner.notify();
    }
}

impl Inner {
    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn snapshot_for(&self, user: &UserId) -> Result<Vec<ShoppingList>> {
        if let Some(message) = lock(&self.failures).subscriptions.clone() {
            return Err(Error::RemoteUnavailable(message));
        }
        Ok(lock(&self.lists)
            .iter()
            .filter(|list| list.is_visible_to(user))
            .cloned()
            .collect())
    }

    fn begin_write(&self) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        match lock(&self.failures).writes.clone() {
            Some(message) => Err(Error::RemoteUnavailable(message)),
            None => Ok(()),
        }
    }

    /// Run `apply` against one document and notify subscribers on success.
    fn modify<T>(
        &self,
        id: &ListId,
        apply: impl FnOnce(&mut ShoppingList) -> Result<T>,
    ) -> Result<T> {
        let result = {
            let mut lists = lock(&self.lists);
            let list = lists
                .iter_mut()
                .find(|list| list.id == *id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            apply(list)?
        };
        self.notify();
        Ok(result)
    }
}

#[async_trait]
impl RemoteListSource for MemoryListStore {
    async fn subscribe(&self, user: &UserId) -> Result<ListSubscription> {
        if let Some(message) = lock(&self.inner.failures).subscriptions.clone() {
            return Err(Error::RemoteUnavailable(message));
        }
        let inner = Arc::clone(&self.inner);
        let user = user.clone();
        Ok(spawn_snapshot_feed(
            self.inner.changes.subscribe(),
            move || {
                let delivery = inner.snapshot_for(&user);
                async move { delivery }
            },
        ))
    }

    async fn create(&self, owner: &UserId, draft: &ListDraft) -> Result<ShoppingList> {
        self.inner.begin_write()?;
        let now = unix_millis_now();
        let list = ShoppingList {
            id: ListId::generate(),
            name: draft.name.clone(),
            items: draft.items.clone(),
            owner_id: owner.clone(),
            shared_with: BTreeSet::new(),
            visibility: draft.visibility,
            created_at: now,
            updated_at: now,
        };
        lock(&self.inner.lists).push(list.clone());
        self.inner.notify();
        Ok(list)
    }

    async fn fetch(&self, id: &ListId) -> Result<Option<ShoppingList>> {
        Ok(lock(&self.inner.lists)
            .iter()
            .find(|list| list.id == *id)
            .cloned())
    }

    async fn update_contents(
        &self,
        actor: &UserId,
        id: &ListId,
        name: &str,
        items: &[Item],
    ) -> Result<()> {
        self.inner.begin_write()?;
        self.inner.modify(id, |list| {
            ensure_owner(list, actor)?;
            list.name = name.to_string();
            list.items = items.to_vec();
            list.updated_at = unix_millis_now();
            Ok(())
        })
    }

    async fn replace_items(&self, actor: &UserId, id: &ListId, items: &[Item]) -> Result<()> {
        self.inner.begin_write()?;
        self.inner.modify(id, |list| {
            ensure_visible(list, actor)?;
            list.items = items.to_vec();
            list.updated_at = unix_millis_now();
            Ok(())
        })
    }

    async fn delete(&self, actor: &UserId, id: &ListId) -> Result<()> {
        self.inner.begin_write()?;
        {
            let mut lists = lock(&self.inner.lists);
            let index = lists
                .iter()
                .position(|list| list.id == *id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            ensure_owner(&lists[index], actor)?;
            lists.remove(index);
        }
        self.inner.notify();
        Ok(())
    }

    async fn add_shared_user(&self, actor: &UserId, id: &ListId, user: &UserId) -> Result<bool> {
        self.inner.begin_write()?;
        self.inner.modify(id, |list| {
            ensure_owner(list, actor)?;
            if list.is_owned_by(user) {
                return Ok(false);
            }
            let added = list.shared_with.insert(user.clone());
            if added {
                list.updated_at = unix_millis_now();
            }
            Ok(added)
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        Ok(lock(&self.inner.profiles).get(email).cloned())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let mut profiles = lock(&self.inner.profiles);
        profiles.retain(|_, existing| existing.id != profile.id);
        profiles.insert(profile.email.clone(), profile.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Visibility;
    use pretty_assertions::assert_eq;

    fn draft() -> ListDraft {
        ListDraft::new("Groceries", &["Milk", "Eggs"], Visibility::Private).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscription_sees_later_writes() {
        let store = MemoryListStore::new();
        let alice = UserId::from("alice");
        let mut subscription = store.subscribe(&alice).await.unwrap();

        assert!(subscription.next().await.unwrap().unwrap().is_empty());
        store.create(&alice, &draft()).await.unwrap();

        let snapshot = subscription.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].owner_id, alice);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscriptions_only_see_visible_lists() {
        let store = MemoryListStore::new();
        store.create(&UserId::from("alice"), &draft()).await.unwrap();

        let mut subscription = store.subscribe(&UserId::from("bob")).await.unwrap();
        assert!(subscription.next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn non_owner_update_is_rejected() {
        let store = MemoryListStore::new();
        let list = store.create(&UserId::from("alice"), &draft()).await.unwrap();

        let error = store
            .update_contents(&UserId::from("bob"), &list.id, "Mine", &[])
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Permission(_)));
        assert_eq!(store.fetch(&list.id).await.unwrap().unwrap(), list);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sharing_is_a_set_union() {
        let store = MemoryListStore::new();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let list = store.create(&alice, &draft()).await.unwrap();

        assert!(store.add_shared_user(&alice, &list.id, &bob).await.unwrap());
        assert!(!store.add_shared_user(&alice, &list.id, &bob).await.unwrap());
        assert!(!store.add_shared_user(&alice, &list.id, &alice).await.unwrap());

        let fetched = store.fetch(&list.id).await.unwrap().unwrap();
        assert_eq!(fetched.shared_with, BTreeSet::from([bob]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_subscriptions_push_an_error_to_live_feeds() {
        let store = MemoryListStore::new();
        let mut subscription = store.subscribe(&UserId::from("alice")).await.unwrap();
        subscription.next().await.unwrap().unwrap();

        store.fail_subscriptions("permission denied");

        assert!(subscription.next().await.unwrap().is_err());
        assert!(store.subscribe(&UserId::from("alice")).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_failures_are_counted() {
        let store = MemoryListStore::new();
        store.fail_writes("unavailable");

        assert!(store.create(&UserId::from("alice"), &draft()).await.is_err());
        assert_eq!(store.write_attempts(), 1);
        assert!(store.documents().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn profiles_are_keyed_by_email() {
        let store = MemoryListStore::new();
        let bob = UserProfile::new(UserId::from("bob"), "bob@example.com", None);
        store.upsert_profile(&bob).await.unwrap();
        let moved = UserProfile::new(UserId::from("bob"), "robert@example.com", None);
        store.upsert_profile(&moved).await.unwrap();

        assert!(store
            .find_user_by_email("bob@example.com")
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store
                .find_user_by_email("robert@example.com")
                .await
                .unwrap()
                .unwrap()
                .id,
            UserId::from("bob")
        );
    }
}
