//! Shopping list model

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use super::{ListId, UserId};
use crate::error::{Error, Result};

/// Whether a list is included in share notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

/// A single entry in a list. Identity is its position in `ShoppingList::items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub checked: bool,
}

impl Item {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checked: false,
        }
    }
}

/// A shopping list document as stored by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingList {
    /// Store-assigned identifier
    pub id: ListId,
    /// Display name (never empty)
    pub name: String,
    /// Items in insertion order
    #[serde(default, deserialize_with = "deserialize_items")]
    pub items: Vec<Item>,
    /// Creating user; immutable
    pub owner_id: UserId,
    /// Users granted access without ownership
    #[serde(default)]
    pub shared_with: BTreeSet<UserId>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl ShoppingList {
    /// Visibility rule shared by every store query and the sync controller.
    pub fn is_visible_to(&self, user: &UserId) -> bool {
        self.owner_id == *user || self.shared_with.contains(user)
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.owner_id == *user
    }

    /// Comma-joined item names, as shown in edit forms.
    #[must_use]
    pub fn items_text(&self) -> String {
        self.items
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Number of checked items
    pub fn checked_count(&self) -> usize {
        self.items.iter().filter(|item| item.checked).count()
    }
}

/// A list as seen by one particular user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleList {
    #[serde(flatten)]
    pub list: ShoppingList,
    pub is_owner: bool,
}

impl VisibleList {
    pub fn for_user(list: ShoppingList, user: &UserId) -> Self {
        let is_owner = list.is_owned_by(user);
        Self { list, is_owner }
    }
}

/// Validated input for creating a list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDraft {
    pub name: String,
    pub items: Vec<Item>,
    pub visibility: Visibility,
}

impl ListDraft {
    /// Validate a new list: name and at least one item must be non-empty after trimming.
    pub fn new<S: AsRef<str>>(name: &str, items: &[S], visibility: Visibility) -> Result<Self> {
        let name = normalize_name(name)?;
        let items = normalize_items(items.iter().map(|item| Item::new(item.as_ref())));
        if items.is_empty() {
            return Err(Error::Validation(
                "Please enter at least one item.".to_string(),
            ));
        }
        Ok(Self {
            name,
            items,
            visibility,
        })
    }
}

/// Trim a list name, rejecting empty names.
pub fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation(
            "Please enter a name for your shopping list.".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Trim item names and drop the ones left empty, keeping order and checked state.
pub fn normalize_items(items: impl IntoIterator<Item = Item>) -> Vec<Item> {
    items
        .into_iter()
        .filter_map(|item| {
            let name = item.name.trim();
            (!name.is_empty()).then(|| Item {
                name: name.to_string(),
                checked: item.checked,
            })
        })
        .collect()
}

/// Parse comma-separated item text ("Milk, Eggs, Bread") into unchecked items.
///
/// # Examples
///
/// ```
/// use trolley_core::models::parse_items;
///
/// let items = parse_items("Milk, , Eggs ");
/// assert_eq!(items.len(), 2);
/// assert_eq!(items[1].name, "Eggs");
/// ```
#[must_use]
pub fn parse_items(text: &str) -> Vec<Item> {
    normalize_items(text.split(',').map(Item::new))
}

/// Older documents stored items as bare strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredItem {
    Full(Item),
    Legacy(String),
}

impl StoredItem {
    fn into_item(self) -> Item {
        match self {
            Self::Full(item) => item,
            Self::Legacy(name) => Item::new(name),
        }
    }
}

/// Decode a JSON items array, upgrading legacy string entries.
pub(crate) fn items_from_json(raw: &str) -> serde_json::Result<Vec<Item>> {
    let stored: Vec<StoredItem> = serde_json::from_str(raw)?;
    Ok(stored.into_iter().map(StoredItem::into_item).collect())
}

fn deserialize_items<'de, D>(deserializer: D) -> std::result::Result<Vec<Item>, D::Error>
where
    D: Deserializer<'de>,
{
    let stored = Vec::<StoredItem>::deserialize(deserializer)?;
    Ok(stored.into_iter().map(StoredItem::into_item).collect())
}
