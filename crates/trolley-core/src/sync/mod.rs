//! List synchronization
//!
//! The [`SyncController`] keeps one in-memory view of the lists visible to
//! the signed-in user, fed by the remote subscription while online and by
//! the local cache otherwise.

mod controller;
mod phase;
mod view;

pub use controller::SyncController;
pub use phase::SyncPhase;
pub use view::{ListView, SharedListView, ViewSource};
