use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use trolley_core::auth::{AuthSession, AuthState, AuthUser};
use trolley_core::cache::LibSqlCacheStore;
use trolley_core::config::ClientConfig;
use trolley_core::db::Database;
use trolley_core::models::{normalize_email, Item, UserProfile};
use trolley_core::remote::{LibSqlListStore, RemoteListSource};
use trolley_core::sync::ViewSource;
use trolley_core::{
    Backend, Connectivity, MutationGateway, ShoppingList, SyncController, UserId, VisibleList,
};

use crate::auth::{load_stored_session, SupabaseAuthService};
use crate::commands::GlobalOptions;
use crate::error::CliError;

const LISTS_DB_FILE: &str = "lists.db";
const CACHE_DB_FILE: &str = "cache.db";
const ENV_DATA_DIR: &str = "TROLLEY_DATA_DIR";
const SHORT_ID_LEN: usize = 13;
const SNAPSHOT_WAIT: Duration = Duration::from_secs(5);

pub type CliController = SyncController<LibSqlListStore, LibSqlCacheStore>;
pub type CliGateway = MutationGateway<LibSqlListStore, LibSqlCacheStore>;

pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(dir) = cli_data_dir.or_else(|| env::var_os(ENV_DATA_DIR).map(PathBuf::from)) {
        return Ok(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("trolley"))
        .ok_or_else(|| CliError::Config("could not resolve the user data directory".into()))
}

/// Storage handles for one run.
pub struct Stores {
    pub remote: Arc<LibSqlListStore>,
    pub cache: Arc<LibSqlCacheStore>,
    /// Whether `remote` is reachable and authoritative.
    pub online: bool,
}

/// Open the offline cache and, unless `want_online` is false, the list
/// database. A configured remote that cannot be reached leaves the run
/// offline instead of failing.
pub async fn open_stores(
    data_dir: &Path,
    config: &ClientConfig,
    want_online: bool,
) -> Result<Stores, CliError> {
    let cache = Arc::new(LibSqlCacheStore::from_database(
        Database::open(data_dir.join(CACHE_DB_FILE)).await?,
    ));

    let database = if want_online {
        open_list_database(&data_dir.join(LISTS_DB_FILE), config).await?
    } else {
        None
    };

    let online = database.is_some();
    let remote = match database {
        Some(database) => LibSqlListStore::from_database(database),
        // Never read while offline: the gateway refuses writes and the
        // controller serves the cache.
        None => LibSqlListStore::open_in_memory().await?,
    };

    Ok(Stores {
        remote: Arc::new(remote),
        cache,
        online,
    })
}

async fn open_list_database(
    path: &Path,
    config: &ClientConfig,
) -> Result<Option<Database>, CliError> {
    let Some(sync_config) = config.sync_config()? else {
        return Ok(Some(Database::open(path).await?));
    };
    match Database::open_with_sync(path, sync_config).await {
        Ok(database) => Ok(Some(database)),
        Err(error) => {
            tracing::warn!(%error, "List database unreachable; continuing offline");
            Ok(None)
        }
    }
}

/// Restore the profile's session. Offline runs use the stored session as-is
/// since only the identity is needed.
pub async fn restore_session(
    options: &GlobalOptions,
    config: &ClientConfig,
    auth_state: &AuthState,
) -> Result<Option<AuthSession>, CliError> {
    if !options.offline {
        if let Some(service) =
            SupabaseAuthService::for_profile(&options.profile_name, config, auth_state.clone())?
        {
            return Ok(service.restore_session().await?);
        }
    }

    let session = load_stored_session(&options.profile_name)?;
    if let Some(session) = session.as_ref() {
        auth_state.signed_in(session.user.clone());
    }
    Ok(session)
}

/// Publish the signed-in user in the directory so others can share with them
/// by e-mail. An existing display name is kept unless a new one is given.
pub async fn register_profile<R: RemoteListSource>(
    remote: &R,
    user: &AuthUser,
    display_name: Option<String>,
) -> Result<(), CliError> {
    let Some(email) = user.email.as_deref() else {
        return Ok(());
    };
    let existing = remote.find_user_by_email(&normalize_email(email)).await?;
    let display_name = display_name.or_else(|| {
        existing
            .as_ref()
            .filter(|profile| profile.id == user.id)
            .and_then(|profile| profile.display_name.clone())
    });

    let profile = UserProfile::new(user.id.clone(), email, display_name);
    if existing.as_ref() != Some(&profile) {
        remote.upsert_profile(&profile).await?;
        tracing::debug!(user = %user.id, "Registered user profile");
    }
    Ok(())
}

/// A signed-in session wired to the controller and gateway.
pub struct Workspace {
    pub auth: AuthSession,
    pub auth_state: AuthState,
    pub config: ClientConfig,
    pub remote: Arc<LibSqlListStore>,
    pub controller: CliController,
    pub gateway: CliGateway,
}

pub async fn open_workspace(options: &GlobalOptions) -> Result<Workspace, CliError> {
    let config = options.client_config()?;
    let auth_state = AuthState::new();
    let auth = restore_session(options, &config, &auth_state)
        .await?
        .ok_or(CliError::NotSignedIn)?;
    let stores = open_stores(&options.data_dir, &config, !options.offline).await?;
    Ok(Workspace::start(auth, auth_state, config, stores).await)
}

impl Workspace {
    pub async fn start(
        auth: AuthSession,
        auth_state: AuthState,
        config: ClientConfig,
        stores: Stores,
    ) -> Self {
        if stores.online {
            if let Err(error) = register_profile(stores.remote.as_ref(), &auth.user, None).await {
                tracing::warn!(%error, "Failed to register user profile");
            }
        }

        let backend = Backend::new(
            Arc::clone(&stores.remote),
            stores.cache,
            Connectivity::new(stores.online),
        );
        let mut controller = SyncController::new(backend);
        let session = controller.sign_in(auth.user.id.clone()).await;
        let gateway = MutationGateway::new(session);

        let mut workspace = Self {
            auth,
            auth_state,
            config,
            remote: stores.remote,
            controller,
            gateway,
        };
        workspace.await_snapshot().await;
        workspace
    }

    pub fn user(&self) -> &UserId {
        self.gateway.session().user()
    }

    /// Apply the next remote snapshot, if one arrives in time, and persist it
    /// to the cache.
    pub async fn await_snapshot(&mut self) {
        if self.controller.phase().is_remote()
            && tokio::time::timeout(SNAPSHOT_WAIT, self.controller.next_event())
                .await
                .is_err()
        {
            tracing::warn!("Timed out waiting for the list snapshot");
        }
        self.controller.flush_cache_writes().await;
    }

    pub async fn visible_lists(&self) -> Vec<VisibleList> {
        self.gateway.session().view().lock().await.visible_lists()
    }

    pub async fn view_state(&self) -> (ViewSource, Option<String>) {
        let view = self.gateway.session().view().lock().await;
        (view.source(), view.notice().map(str::to_string))
    }

    /// Find a list in the current view by ID prefix or exact name.
    pub async fn resolve_list(&self, query: &str) -> Result<ShoppingList, CliError> {
        let view = self.gateway.session().view().lock().await;
        resolve_list_query(view.lists(), query).cloned()
    }

    /// Write the view through to the cache after a successful remote write,
    /// so the next offline run sees it.
    pub async fn persist_view(&self) -> Result<(), CliError> {
        if !self.controller.backend().connectivity.is_online() {
            return Ok(());
        }
        let lists = self.gateway.session().view().lock().await.lists().to_vec();
        self.controller
            .backend()
            .cache
            .save(self.user(), &lists)
            .await?;
        Ok(())
    }

    pub async fn finish(mut self) {
        self.controller.flush_cache_writes().await;
        self.controller.detach();
    }
}

pub fn resolve_list_query<'a>(
    lists: &'a [ShoppingList],
    query: &str,
) -> Result<&'a ShoppingList, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::EmptyListQuery);
    }

    if let Some(list) = lists.iter().find(|list| list.id.as_str() == query) {
        return Ok(list);
    }

    let by_name = lists
        .iter()
        .filter(|list| list.name.eq_ignore_ascii_case(query))
        .collect::<Vec<_>>();
    let by_prefix = lists
        .iter()
        .filter(|list| list.id.as_str().starts_with(query))
        .collect::<Vec<_>>();
    let matches = if by_name.is_empty() {
        by_prefix
    } else {
        by_name
    };

    match matches.as_slice() {
        [] => Err(CliError::ListNotFound(query.to_string())),
        [list] => Ok(list),
        several => {
            let options = several
                .iter()
                .take(3)
                .map(|list| format!("{} ({})", short_id(list), list.name))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousList(format!(
                "'{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Keep the checked state of items whose names survive an edit.
pub fn carry_checked_state(previous: &[Item], next: Vec<Item>) -> Vec<Item> {
    next.into_iter()
        .map(|mut item| {
            item.checked = previous
                .iter()
                .any(|old| old.checked && old.name.eq_ignore_ascii_case(&item.name));
            item
        })
        .collect()
}

pub fn short_id(list: &ShoppingList) -> String {
    list.id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_item_line(index: usize, item: &Item) -> String {
    let mark = if item.checked { 'x' } else { ' ' };
    format!("[{mark}] {}. {}", index + 1, item.name)
}

pub fn format_list_lines(lists: &[VisibleList]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    let mut lines = Vec::new();
    for visible in lists {
        let list = &visible.list;
        let progress = format!("{}/{}", list.checked_count(), list.items.len());
        let relative_time = format_relative_time(list.updated_at, now_ms);
        let marker = if visible.is_owner { "" } else { "  (shared with you)" };
        lines.push(format!(
            "{:<13}  {:<28}  {progress:>5}  {relative_time}{marker}",
            short_id(list),
            list.name
        ));
        lines.extend(
            list.items
                .iter()
                .enumerate()
                .map(|(index, item)| format!("    {}", format_item_line(index, item))),
        );
    }
    lines
}

pub const fn source_label(source: ViewSource) -> &'static str {
    match source {
        ViewSource::Empty => "empty",
        ViewSource::Remote => "live",
        ViewSource::Cache => "cached",
    }
}

#[derive(Debug, Serialize)]
pub struct ListsOutput {
    pub source: &'static str,
    pub notice: Option<String>,
    pub lists: Vec<VisibleList>,
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
