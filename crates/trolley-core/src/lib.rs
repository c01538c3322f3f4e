//! trolley-core - Core library for Trolley
//!
//! This crate contains the list models, the local cache, the remote list
//! source abstraction, and the sync controller / mutation gateway pair used
//! by every Trolley interface.

pub mod auth;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod notify;
pub mod remote;
pub mod session;
pub mod sync;
pub mod util;

pub use connectivity::Connectivity;
pub use error::{Error, Result};
pub use gateway::{MutationGateway, ToggleOutcome};
pub use models::{Item, ListId, ShoppingList, UserId, Visibility, VisibleList};
pub use session::{Backend, SessionContext};
pub use sync::{SyncController, SyncPhase};
