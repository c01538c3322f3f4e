//! End-to-end list synchronization scenarios across controller, gateway,
//! remote store, and cache.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use trolley_core::cache::{CacheStore, LibSqlCacheStore, MemoryCacheStore};
use trolley_core::remote::{LibSqlListStore, MemoryListStore, RemoteListSource};
use trolley_core::sync::ViewSource;
use trolley_core::{
    Backend, Connectivity, Error, Item, MutationGateway, SyncController, SyncPhase, UserId,
    Visibility,
};

struct Client<R, C> {
    controller: SyncController<R, C>,
    gateway: MutationGateway<R, C>,
}

async fn client<R, C>(
    remote: Arc<R>,
    cache: Arc<C>,
    connectivity: Connectivity,
    user: &str,
) -> Client<R, C>
where
    R: RemoteListSource + 'static,
    C: CacheStore + 'static,
{
    let mut controller = SyncController::new(Backend::new(remote, cache, connectivity));
    let session = controller.sign_in(UserId::from(user)).await;
    assert!(controller.next_event().await);
    Client {
        controller,
        gateway: MutationGateway::new(session),
    }
}

async fn names<R, C>(client: &Client<R, C>) -> Vec<String>
where
    R: RemoteListSource,
    C: CacheStore,
{
    client
        .gateway
        .session()
        .view()
        .lock()
        .await
        .lists()
        .iter()
        .map(|list| list.name.clone())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn create_then_read_yields_one_owned_list() {
    let remote = Arc::new(MemoryListStore::new());
    let alice = client(
        Arc::clone(&remote),
        Arc::new(MemoryCacheStore::new()),
        Connectivity::online(),
        "alice",
    )
    .await;

    alice
        .gateway
        .create("Groceries", &["Milk", "Eggs"], Visibility::Private)
        .await
        .unwrap();

    let mut subscription = remote.subscribe(&UserId::from("alice")).await.unwrap();
    let snapshot = subscription.next().await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].name, "Groceries");
    assert_eq!(snapshot[0].items, vec![Item::new("Milk"), Item::new("Eggs")]);
    assert_eq!(snapshot[0].owner_id, UserId::from("alice"));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_owner_update_leaves_document_unchanged() {
    let remote = Arc::new(MemoryListStore::new());
    let alice = client(
        Arc::clone(&remote),
        Arc::new(MemoryCacheStore::new()),
        Connectivity::online(),
        "alice",
    )
    .await;
    let list = alice
        .gateway
        .create("Groceries", &["Milk"], Visibility::Private)
        .await
        .unwrap();
    alice.gateway.share(&list.id, &UserId::from("bob")).await.unwrap();
    let before = remote.fetch(&list.id).await.unwrap().unwrap();

    let bob = client(
        Arc::clone(&remote),
        Arc::new(MemoryCacheStore::new()),
        Connectivity::online(),
        "bob",
    )
    .await;
    let error = bob
        .gateway
        .update(&list.id, "Bob's now", &[Item::new("Chips")])
        .await
        .unwrap_err();

    assert!(matches!(error, Error::Permission(_)));
    assert_eq!(remote.fetch(&list.id).await.unwrap().unwrap(), before);
}

#[tokio::test(flavor = "multi_thread")]
async fn sharing_twice_records_user_once() {
    let remote = Arc::new(MemoryListStore::new());
    let alice = client(
        Arc::clone(&remote),
        Arc::new(MemoryCacheStore::new()),
        Connectivity::online(),
        "alice",
    )
    .await;
    let list = alice
        .gateway
        .create("Groceries", &["Milk"], Visibility::Private)
        .await
        .unwrap();

    alice.gateway.share(&list.id, &UserId::from("bob")).await.unwrap();
    let second = alice.gateway.share(&list.id, &UserId::from("bob")).await;

    assert!(matches!(second, Err(Error::DuplicateShare { .. })));
    let stored = remote.fetch(&list.id).await.unwrap().unwrap();
    assert_eq!(
        stored
            .shared_with
            .iter()
            .filter(|user| **user == UserId::from("bob"))
            .count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn toggling_twice_restores_checked_state() {
    let remote = Arc::new(MemoryListStore::new());
    let alice = client(
        Arc::clone(&remote),
        Arc::new(MemoryCacheStore::new()),
        Connectivity::online(),
        "alice",
    )
    .await;
    let list = alice
        .gateway
        .create("Groceries", &["Milk", "Eggs"], Visibility::Private)
        .await
        .unwrap();

    alice.gateway.toggle_item_checked(&list.id, 0).await.unwrap();
    alice.gateway.toggle_item_checked(&list.id, 0).await.unwrap();

    let stored = remote.fetch(&list.id).await.unwrap().unwrap();
    assert!(!stored.items[0].checked);
}

#[tokio::test(flavor = "multi_thread")]
async fn connectivity_round_trip_switches_sources_without_writes() {
    let remote = Arc::new(MemoryListStore::new());
    let connectivity = Connectivity::online();
    let mut alice = client(
        Arc::clone(&remote),
        Arc::new(MemoryCacheStore::new()),
        connectivity.clone(),
        "alice",
    )
    .await;
    alice
        .gateway
        .create("Groceries", &["Milk"], Visibility::Private)
        .await
        .unwrap();
    alice.controller.next_event().await;
    alice.controller.flush_cache_writes().await;
    let view = Arc::clone(alice.gateway.session().view());
    assert_eq!(view.lock().await.source(), ViewSource::Remote);

    alice.controller.set_online(false).await;
    let writes = remote.write_attempts();
    assert_eq!(alice.controller.phase(), SyncPhase::CacheFallback);
    assert_eq!(view.lock().await.source(), ViewSource::Cache);
    assert_eq!(names(&alice).await, vec!["Groceries".to_string()]);

    let offline = alice
        .gateway
        .create("Hardware", &["Nails"], Visibility::Private)
        .await;
    assert!(matches!(offline, Err(Error::Offline(_))));
    assert_eq!(remote.write_attempts(), writes);

    // Another device adds a list while this one is offline.
    remote
        .create(
            &UserId::from("alice"),
            &trolley_core::models::ListDraft::new("Pharmacy", &["Aspirin"], Visibility::Private)
                .unwrap(),
        )
        .await
        .unwrap();

    alice.controller.set_online(true).await;
    assert!(alice.controller.next_event().await);
    assert_eq!(alice.controller.phase(), SyncPhase::Live);
    assert_eq!(view.lock().await.source(), ViewSource::Remote);
    assert_eq!(
        names(&alice).await,
        vec!["Groceries".to_string(), "Pharmacy".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_list_appears_for_recipient_after_reattach() {
    let remote = Arc::new(LibSqlListStore::open_in_memory().await.unwrap());
    let alice = client(
        Arc::clone(&remote),
        Arc::new(LibSqlCacheStore::open_in_memory().await.unwrap()),
        Connectivity::online(),
        "alice",
    )
    .await;
    let mut bob = client(
        Arc::clone(&remote),
        Arc::new(LibSqlCacheStore::open_in_memory().await.unwrap()),
        Connectivity::online(),
        "bob",
    )
    .await;

    let list = alice
        .gateway
        .create("Groceries", &["Milk", "Eggs"], Visibility::Private)
        .await
        .unwrap();
    alice.gateway.share(&list.id, &UserId::from("bob")).await.unwrap();

    bob.controller.detach();
    bob.controller.attach().await;
    assert!(bob.controller.next_event().await);

    let visible = bob.gateway.session().view().lock().await.visible_lists();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].list.name, "Groceries");
    assert!(!visible[0].is_owner);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_delete_keeps_list_in_view() {
    let remote = Arc::new(MemoryListStore::new());
    let mut alice = client(
        Arc::clone(&remote),
        Arc::new(MemoryCacheStore::new()),
        Connectivity::online(),
        "alice",
    )
    .await;
    let list = alice
        .gateway
        .create("Groceries", &["Milk"], Visibility::Private)
        .await
        .unwrap();
    alice.controller.next_event().await;

    alice.controller.set_online(false).await;
    let error = alice.gateway.delete(&list.id).await.unwrap_err();

    assert!(matches!(error, Error::Offline(_)));
    assert_eq!(
        error.user_message(),
        "You are offline. Reconnect to delete a list."
    );
    let view = alice.gateway.session().view().lock().await;
    assert!(view.find(&list.id).is_some());
    assert_eq!(remote.documents().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn next_user_never_sees_previous_users_cache() {
    let remote = Arc::new(MemoryListStore::new());
    let cache = Arc::new(MemoryCacheStore::new());
    let connectivity = Connectivity::online();
    let mut alice = client(
        Arc::clone(&remote),
        Arc::clone(&cache),
        connectivity.clone(),
        "alice",
    )
    .await;
    alice
        .gateway
        .create("Groceries", &["Milk"], Visibility::Private)
        .await
        .unwrap();
    alice.controller.next_event().await;
    alice.controller.flush_cache_writes().await;

    connectivity.set_online(false);
    let session = alice.controller.sign_in(UserId::from("carol")).await;

    assert_eq!(alice.controller.phase(), SyncPhase::CacheFallback);
    assert!(session.view().lock().await.is_empty());
    assert!(cache.peek("shopping_lists_alice").is_some());
}
