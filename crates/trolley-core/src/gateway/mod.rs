//! Mutation gateway
//!
//! Every user-initiated write goes through here. Each operation checks the
//! session, connectivity, and ownership on its own, writes to the remote
//! store, and only then reflects the result in the session's view. Item
//! toggles are the exception: they flip the view first and roll back if the
//! remote write fails.

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::models::{
    normalize_email, normalize_items, normalize_name, Item, ListDraft, ListId, ShoppingList,
    UserId, UserProfile, Visibility,
};
use crate::remote::RemoteListSource;
use crate::session::SessionContext;
use crate::util::unix_millis_now;

/// Result of toggling an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Written to the remote store.
    Synced,
    /// Offline: kept in the view only, until the next snapshot replaces it.
    LocalOnly,
}

pub struct MutationGateway<R, C> {
    session: SessionContext<R, C>,
}

impl<R, C> Clone for MutationGateway<R, C> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<R: RemoteListSource, C: CacheStore> MutationGateway<R, C> {
    pub const fn new(session: SessionContext<R, C>) -> Self {
        Self { session }
    }

    pub const fn session(&self) -> &SessionContext<R, C> {
        &self.session
    }

    fn user(&self) -> &UserId {
        self.session.user()
    }

    fn remote(&self) -> &R {
        &self.session.backend().remote
    }

    fn require_online(&self, operation: &'static str) -> Result<()> {
        self.session.ensure_active()?;
        if self.session.is_online() {
            Ok(())
        } else {
            Err(Error::Offline(operation))
        }
    }

    /// Fresh read of a list the current user owns.
    async fn owned_list(&self, id: &ListId) -> Result<ShoppingList> {
        let list = self
            .remote()
            .fetch(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if !list.is_owned_by(self.user()) {
            return Err(Error::Permission(format!(
                "{} does not own list {id}",
                self.user()
            )));
        }
        Ok(list)
    }

    /// Re-read a list after writing it and merge the stored copy into the
    /// view. `written` stands in when the re-read fails. A copy the
    /// subscription delivered in the meantime is kept if it is newer.
    async fn reflect_write(&self, written: ShoppingList) -> ShoppingList {
        let list = match self.remote().fetch(&written.id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => written,
            Err(error) => {
                tracing::debug!(list_id = %written.id, %error, "Re-read after write failed");
                written
            }
        };
        self.session.view().lock().await.upsert_if_newer(list.clone());
        list
    }

    pub async fn create<S: AsRef<str>>(
        &self,
        name: &str,
        items: &[S],
        visibility: Visibility,
    ) -> Result<ShoppingList> {
        let draft = ListDraft::new(name, items, visibility)?;
        self.require_online("create a list")?;

        let list = self.remote().create(self.user(), &draft).await?;
        tracing::info!(list_id = %list.id, user = %self.user(), "Created list");
        self.session.view().lock().await.upsert(list.clone());
        Ok(list)
    }

    /// Rename and rewrite items. Owner only; sharing and ownership are untouched.
    pub async fn update(&self, id: &ListId, name: &str, items: &[Item]) -> Result<ShoppingList> {
        let name = normalize_name(name)?;
        let items = normalize_items(items.iter().cloned());
        self.require_online("update a list")?;

        let mut list = self.owned_list(id).await?;
        self.remote()
            .update_contents(self.user(), id, &name, &items)
            .await?;

        list.name = name;
        list.items = items;
        list.updated_at = unix_millis_now();
        tracing::info!(list_id = %id, "Updated list");
        Ok(self.reflect_write(list).await)
    }

    /// Delete a list. Deleting one that is already gone succeeds.
    pub async fn delete(&self, id: &ListId) -> Result<()> {
        self.require_online("delete a list")?;

        match self.owned_list(id).await {
            Ok(_) => match self.remote().delete(self.user(), id).await {
                Ok(()) | Err(Error::NotFound(_)) => {}
                Err(error) => return Err(error),
            },
            Err(Error::NotFound(_)) => {
                tracing::debug!(list_id = %id, "List already deleted");
            }
            Err(error) => return Err(error),
        }

        tracing::info!(list_id = %id, "Deleted list");
        self.session.view().lock().await.remove(id);
        Ok(())
    }

    /// Grant `target` access to a list the current user owns.
    pub async fn share(&self, id: &ListId, target: &UserId) -> Result<()> {
        if target.as_str().trim().is_empty() {
            return Err(Error::Validation(
                "Please enter a user to share with.".to_string(),
            ));
        }
        if target == self.user() {
            return Err(Error::Validation(
                "You cannot share a list with yourself.".to_string(),
            ));
        }
        self.require_online("share a list")?;

        let mut list = self.owned_list(id).await?;
        let duplicate = || Error::DuplicateShare {
            list_id: id.to_string(),
            user_id: target.to_string(),
        };
        if list.shared_with.contains(target) {
            return Err(duplicate());
        }
        if !self.remote().add_shared_user(self.user(), id, target).await? {
            return Err(duplicate());
        }

        list.shared_with.insert(target.clone());
        list.updated_at = unix_millis_now();
        tracing::info!(list_id = %id, target = %target, "Shared list");
        self.reflect_write(list).await;
        Ok(())
    }

    /// Resolve `email` through the user directory, then share with that user.
    pub async fn share_by_email(&self, id: &ListId, email: &str) -> Result<UserProfile> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(Error::Validation(
                "Please enter an email address.".to_string(),
            ));
        }
        self.require_online("share a list")?;

        let profile = self
            .remote()
            .find_user_by_email(&email)
            .await?
            .ok_or(Error::UserNotFound(email))?;
        self.share(id, &profile.id).await?;
        Ok(profile)
    }

    /// Flip an item's checked flag in the view, then write the whole items
    /// array. A failed write restores the flag unless a newer snapshot has
    /// already changed it.
    pub async fn toggle_item_checked(&self, id: &ListId, index: usize) -> Result<ToggleOutcome> {
        self.session.ensure_active()?;

        let (checked, items) = {
            let mut view = self.session.view().lock().await;
            let list = view
                .find_mut(id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let item = list
                .items
                .get_mut(index)
                .ok_or_else(|| {
                    Error::Validation(format!("List has no item {}.", index.saturating_add(1)))
                })?;
            item.checked = !item.checked;
            (item.checked, list.items.clone())
        };

        if !self.session.is_online() {
            tracing::debug!(list_id = %id, index, "Item toggled offline; not synced");
            return Ok(ToggleOutcome::LocalOnly);
        }

        match self.remote().replace_items(self.user(), id, &items).await {
            Ok(()) => Ok(ToggleOutcome::Synced),
            Err(error) => {
                tracing::warn!(list_id = %id, index, %error, "Reverting item toggle");
                let mut view = self.session.view().lock().await;
                if let Some(item) = view
                    .find_mut(id)
                    .and_then(|list| list.items.get_mut(index))
                {
                    if item.checked == checked {
                        item.checked = !checked;
                    }
                }
                Err(error)
            }
        }
    }
}
