use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{SyncPhase, ViewSource};
use crate::auth::AuthUser;
use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::models::{ShoppingList, UserId};
use crate::remote::{ListSubscription, RemoteListSource};
use crate::session::{Backend, SessionContext};

/// Switches the session's view between the remote subscription and the
/// local cache as connectivity and auth change.
///
/// Transitions:
/// - `sign_in`: any phase to `Attaching` (online) or `CacheFallback` (offline)
/// - snapshot delivered: `Attaching`/`Live` to `Live`
/// - subscription error or connectivity lost: `Attaching`/`Live` to `CacheFallback`
/// - connectivity restored: `CacheFallback` to `Attaching`
/// - `detach`: to `Terminated`, keeping the session so `attach` can resume
/// - `sign_out`: to `Terminated`, clearing the view but not the cache
pub struct SyncController<R, C> {
    backend: Backend<R, C>,
    phase: watch::Sender<SyncPhase>,
    view_updates: watch::Sender<u64>,
    session: Option<SessionContext<R, C>>,
    subscription: Option<ListSubscription>,
    cache_write: Option<JoinHandle<()>>,
}

enum LoopEvent {
    Shutdown,
    Auth(Option<AuthUser>),
    Connectivity(bool),
    Delivery(Option<Result<Vec<ShoppingList>>>),
}

impl<R, C> SyncController<R, C>
where
    R: RemoteListSource + 'static,
    C: CacheStore + 'static,
{
    pub fn new(backend: Backend<R, C>) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        let (view_updates, _) = watch::channel(0);
        Self {
            backend,
            phase,
            view_updates,
            session: None,
            subscription: None,
            cache_write: None,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn phase_watch(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Ticks every time the session's view is replaced or cleared.
    pub fn view_updates(&self) -> watch::Receiver<u64> {
        self.view_updates.subscribe()
    }

    pub const fn session(&self) -> Option<&SessionContext<R, C>> {
        self.session.as_ref()
    }

    pub const fn backend(&self) -> &Backend<R, C> {
        &self.backend
    }

    /// Start a session for `user` and attach it. Any previous session is
    /// signed out first.
    pub async fn sign_in(&mut self, user: UserId) -> SessionContext<R, C> {
        if self.session.is_some() {
            self.sign_out().await;
        }
        let session = SessionContext::start(user, self.backend.clone());
        self.session = Some(session.clone());
        self.attach().await;
        session
    }

    /// End the session: cancel the subscription and clear the view. The
    /// cached snapshot stays for the next sign-in.
    pub async fn sign_out(&mut self) {
        self.cancel_subscription();
        self.flush_cache_writes().await;
        if let Some(session) = self.session.take() {
            session.end();
            session.view().lock().await.clear();
            self.bump_view();
            tracing::info!(user = %session.user(), "Session ended");
        }
        self.set_phase(SyncPhase::Terminated);
    }

    /// Pick a data source for the current session. Without a session this
    /// does nothing.
    pub async fn attach(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.cancel_subscription();

        if !self.backend.connectivity.is_online() {
            self.fall_back_to_cache(&session, None).await;
            return;
        }

        self.set_phase(SyncPhase::Attaching);
        match self.backend.remote.subscribe(session.user()).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(error) => {
                tracing::warn!(user = %session.user(), %error, "Remote subscription failed");
                self.fall_back_to_cache(&session, Some(error.user_message()))
                    .await;
            }
        }
    }

    /// Tear down the subscription, leaving the session and view in place.
    pub fn detach(&mut self) {
        self.cancel_subscription();
        if self.session.is_some() {
            self.set_phase(SyncPhase::Terminated);
        }
    }

    /// Record a connectivity change and move between remote and cache.
    pub async fn set_online(&mut self, online: bool) {
        self.backend.connectivity.set_online(online);
        self.on_connectivity(online).await;
    }

    /// Wait for the next subscription delivery and apply it.
    ///
    /// Returns false when there is no active subscription.
    pub async fn next_event(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        let delivery = subscription.next().await;
        self.handle_delivery(delivery).await;
        true
    }

    /// Wait until every queued cache write has finished.
    pub async fn flush_cache_writes(&mut self) {
        if let Some(write) = self.cache_write.take() {
            if let Err(error) = write.await {
                tracing::warn!(%error, "Cache write task failed");
            }
        }
    }

    /// Follow auth, connectivity, and the subscription until `shutdown`
    /// resolves or the auth source goes away.
    pub async fn run_until<F>(&mut self, mut auth: watch::Receiver<Option<AuthUser>>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut connectivity = self.backend.connectivity.subscribe();
        tokio::pin!(shutdown);

        let initial = auth.borrow_and_update().clone();
        self.apply_auth(initial).await;

        loop {
            let event = tokio::select! {
                () = &mut shutdown => LoopEvent::Shutdown,
                changed = auth.changed() => match changed {
                    Ok(()) => LoopEvent::Auth(auth.borrow_and_update().clone()),
                    Err(_) => LoopEvent::Shutdown,
                },
                changed = connectivity.changed() => match changed {
                    Ok(()) => LoopEvent::Connectivity(*connectivity.borrow_and_update()),
                    Err(_) => LoopEvent::Shutdown,
                },
                delivery = next_from(&mut self.subscription) => LoopEvent::Delivery(delivery),
            };

            match event {
                LoopEvent::Shutdown => break,
                LoopEvent::Auth(user) => self.apply_auth(user).await,
                LoopEvent::Connectivity(online) => self.on_connectivity(online).await,
                LoopEvent::Delivery(delivery) => self.handle_delivery(delivery).await,
            }
        }

        self.detach();
        self.flush_cache_writes().await;
    }

    async fn apply_auth(&mut self, user: Option<AuthUser>) {
        match user {
            Some(user) => {
                let current = self.session.as_ref().map(SessionContext::user);
                if current != Some(&user.id) {
                    self.sign_in(user.id).await;
                }
            }
            None => {
                if self.session.is_some() {
                    self.sign_out().await;
                }
            }
        }
    }

    async fn on_connectivity(&mut self, online: bool) {
        let Some(session) = self.session.clone() else {
            return;
        };
        match (online, self.phase()) {
            (false, phase) if phase.is_remote() => {
                self.cancel_subscription();
                self.fall_back_to_cache(&session, None).await;
            }
            (true, SyncPhase::CacheFallback) => self.attach().await,
            _ => {}
        }
    }

    async fn handle_delivery(&mut self, delivery: Option<Result<Vec<ShoppingList>>>) {
        let Some(session) = self.session.clone() else {
            return;
        };
        match delivery {
            Some(Ok(snapshot)) => self.apply_snapshot(&session, snapshot).await,
            Some(Err(error)) => {
                tracing::warn!(user = %session.user(), %error, "Remote subscription error");
                self.cancel_subscription();
                self.fall_back_to_cache(&session, Some(error.user_message()))
                    .await;
            }
            None => {
                let error = Error::RemoteUnavailable("subscription closed".to_string());
                tracing::warn!(user = %session.user(), "Remote subscription closed");
                self.cancel_subscription();
                self.fall_back_to_cache(&session, Some(error.user_message()))
                    .await;
            }
        }
    }

    async fn apply_snapshot(&mut self, session: &SessionContext<R, C>, snapshot: Vec<ShoppingList>) {
        let user = session.user();
        let lists: Vec<ShoppingList> = snapshot
            .into_iter()
            .filter(|list| list.is_visible_to(user))
            .collect();

        {
            let mut view = session.view().lock().await;
            view.replace(lists.clone(), ViewSource::Remote);
            view.set_notice(None);
        }
        self.bump_view();
        tracing::debug!(user = %user, lists = lists.len(), "Applied remote snapshot");
        self.set_phase(SyncPhase::Live);
        self.queue_cache_write(user.clone(), lists);
    }

    /// Chain the write behind the previous one so snapshots land in order.
    fn queue_cache_write(&mut self, user: UserId, lists: Vec<ShoppingList>) {
        let previous = self.cache_write.take();
        let cache = self.backend.cache.clone();
        self.cache_write = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                previous.await.ok();
            }
            if let Err(error) = cache.save(&user, &lists).await {
                tracing::warn!(user = %user, %error, "Failed to cache shopping lists");
            }
        }));
    }

    async fn fall_back_to_cache(&mut self, session: &SessionContext<R, C>, notice: Option<String>) {
        self.set_phase(SyncPhase::CacheFallback);
        self.flush_cache_writes().await;

        let (lists, notice) = match self.backend.cache.load(session.user()).await {
            Ok(lists) => (lists, notice),
            Err(error) => {
                tracing::warn!(user = %session.user(), %error, "Failed to read cached lists");
                (Vec::new(), notice.or_else(|| Some(error.user_message())))
            }
        };

        tracing::info!(user = %session.user(), lists = lists.len(), "Showing cached lists");
        let mut view = session.view().lock().await;
        let source = if lists.is_empty() {
            ViewSource::Empty
        } else {
            ViewSource::Cache
        };
        view.replace(lists, source);
        view.set_notice(notice);
        drop(view);
        self.bump_view();
    }

    fn cancel_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
            tracing::debug!("Remote subscription cancelled");
        }
    }

    fn bump_view(&self) {
        self.view_updates
            .send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    fn set_phase(&self, phase: SyncPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            tracing::info!(from = %previous, to = %phase, "Sync phase changed");
        }
    }
}

async fn next_from(
    subscription: &mut Option<ListSubscription>,
) -> Option<Result<Vec<ShoppingList>>> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
