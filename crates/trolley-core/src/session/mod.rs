//! Per-sign-in session context
//!
//! A [`SessionContext`] is created when a user signs in and ended when they
//! sign out. It carries everything the sync controller and the mutation
//! gateway share for that user, so neither reaches for process globals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cache::{CacheStore, ListCache};
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::models::UserId;
use crate::remote::RemoteListSource;
use crate::sync::{ListView, SharedListView};

/// The collaborators every session talks to
pub struct Backend<R, C> {
    pub remote: Arc<R>,
    pub cache: ListCache<C>,
    pub connectivity: Connectivity,
}

impl<R, C> Clone for Backend<R, C> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            cache: self.cache.clone(),
            connectivity: self.connectivity.clone(),
        }
    }
}

impl<R: RemoteListSource, C: CacheStore> Backend<R, C> {
    pub fn new(remote: Arc<R>, cache: Arc<C>, connectivity: Connectivity) -> Self {
        Self {
            remote,
            cache: ListCache::new(cache),
            connectivity,
        }
    }
}

/// State scoped to one signed-in user
pub struct SessionContext<R, C> {
    user: UserId,
    backend: Backend<R, C>,
    view: SharedListView,
    active: Arc<AtomicBool>,
}

impl<R, C> Clone for SessionContext<R, C> {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            backend: self.backend.clone(),
            view: Arc::clone(&self.view),
            active: Arc::clone(&self.active),
        }
    }
}

impl<R, C> SessionContext<R, C> {
    pub(crate) fn start(user: UserId, backend: Backend<R, C>) -> Self {
        let view = Arc::new(Mutex::new(ListView::for_user(user.clone())));
        Self {
            user,
            backend,
            view,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub const fn user(&self) -> &UserId {
        &self.user
    }

    pub const fn backend(&self) -> &Backend<R, C> {
        &self.backend
    }

    pub const fn view(&self) -> &SharedListView {
        &self.view
    }

    pub fn is_online(&self) -> bool {
        self.backend.connectivity.is_online()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::NotSignedIn)
        }
    }

    pub(crate) fn end(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
