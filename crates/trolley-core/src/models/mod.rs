//! Data models for Trolley

mod ids;
pub(crate) mod list;
mod profile;

pub use ids::{ListId, UserId};
pub use list::{
    normalize_items, normalize_name, parse_items, Item, ListDraft, ShoppingList, Visibility,
    VisibleList,
};
pub use profile::{normalize_email, UserProfile};
