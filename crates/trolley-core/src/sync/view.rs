use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::{ListId, ShoppingList, UserId, VisibleList};

/// Where the lists currently in view came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewSource {
    #[default]
    Empty,
    Remote,
    Cache,
}

/// In-memory lists for the signed-in user, shared by the sync controller
/// and the mutation gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListView {
    user: Option<UserId>,
    lists: Vec<ShoppingList>,
    source: ViewSource,
    notice: Option<String>,
}

pub type SharedListView = Arc<Mutex<ListView>>;

impl ListView {
    pub fn for_user(user: UserId) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }

    pub const fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn lists(&self) -> &[ShoppingList] {
        &self.lists
    }

    pub const fn source(&self) -> ViewSource {
        self.source
    }

    /// Message to show alongside the lists, e.g. why the cache is in use.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Lists annotated with ownership for the view's user.
    pub fn visible_lists(&self) -> Vec<VisibleList> {
        let Some(user) = &self.user else {
            return Vec::new();
        };
        self.lists
            .iter()
            .cloned()
            .map(|list| VisibleList::for_user(list, user))
            .collect()
    }

    pub fn find(&self, id: &ListId) -> Option<&ShoppingList> {
        self.lists.iter().find(|list| list.id == *id)
    }

    pub(crate) fn find_mut(&mut self, id: &ListId) -> Option<&mut ShoppingList> {
        self.lists.iter_mut().find(|list| list.id == *id)
    }

    pub(crate) fn replace(&mut self, lists: Vec<ShoppingList>, source: ViewSource) {
        self.lists = lists;
        self.source = source;
    }

    pub(crate) fn set_notice(&mut self, notice: Option<String>) {
        self.notice = notice;
    }

    /// Insert or replace a document written by this client.
    pub(crate) fn upsert(&mut self, list: ShoppingList) {
        match self.find_mut(&list.id) {
            Some(existing) => *existing = list,
            None => self.lists.push(list),
        }
    }

    /// Like `upsert`, but an existing copy with a later `updated_at` wins.
    pub(crate) fn upsert_if_newer(&mut self, list: ShoppingList) {
        match self.find_mut(&list.id) {
            Some(existing) if existing.updated_at > list.updated_at => {}
            Some(existing) => *existing = list,
            None => self.lists.push(list),
        }
    }

    pub(crate) fn remove(&mut self, id: &ListId) {
        self.lists.retain(|list| list.id != *id);
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
