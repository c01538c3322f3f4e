use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use pretty_assertions::assert_eq;
use trolley_core::auth::{AuthSession, AuthState, AuthUser};
use trolley_core::config::ClientConfig;
use trolley_core::remote::{MemoryListStore, RemoteListSource};
use trolley_core::sync::ViewSource;
use trolley_core::{Item, ListId, ShoppingList, UserId, Visibility, VisibleList};

use crate::cli::{Cli, Commands, CompletionShell};
use crate::commands::common::{
    carry_checked_state, format_item_line, format_list_lines, format_relative_time, open_stores,
    register_profile, resolve_data_dir, resolve_list_query, Workspace,
};
use crate::commands::completions::{render_completions, run_completions};
use crate::commands::config::merge_init_values;
use crate::commands::share::{is_email_target, share_message};
use crate::error::CliError;

fn list(id: &str, name: &str, owner: &str) -> ShoppingList {
    ShoppingList {
        id: ListId::from(id),
        name: name.to_string(),
        items: vec![Item::new("Milk"), Item::new("Eggs")],
        owner_id: UserId::from(owner),
        shared_with: BTreeSet::new(),
        visibility: Visibility::Private,
        created_at: 0,
        updated_at: 0,
    }
}

fn auth_session(user: &str) -> AuthSession {
    AuthSession {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: i64::MAX,
        user: AuthUser {
            id: UserId::from(user),
            email: Some(format!("{user}@example.com")),
        },
    }
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn resolve_list_query_matches_id_name_and_prefix() {
    let lists = vec![
        list("0190aaaa-0001", "Groceries", "alice"),
        list("0190bbbb-0002", "Hardware", "alice"),
    ];

    assert_eq!(
        resolve_list_query(&lists, "0190bbbb-0002").unwrap().name,
        "Hardware"
    );
    assert_eq!(
        resolve_list_query(&lists, " groceries ").unwrap().name,
        "Groceries"
    );
    assert_eq!(resolve_list_query(&lists, "0190b").unwrap().name, "Hardware");
}

#[test]
fn resolve_list_query_reports_missing_and_ambiguous() {
    let lists = vec![
        list("0190aaaa-0001", "Groceries", "alice"),
        list("0190aaaa-0002", "Pharmacy", "alice"),
    ];

    assert!(matches!(
        resolve_list_query(&lists, "0190a"),
        Err(CliError::AmbiguousList(message)) if message.contains("Groceries")
    ));
    assert!(matches!(
        resolve_list_query(&lists, "bakery"),
        Err(CliError::ListNotFound(_))
    ));
    assert!(matches!(
        resolve_list_query(&lists, "  "),
        Err(CliError::EmptyListQuery)
    ));
}

#[test]
fn edited_items_keep_checked_state_by_name() {
    let previous = vec![
        Item {
            name: "Milk".to_string(),
            checked: true,
        },
        Item::new("Eggs"),
    ];
    let next = vec![Item::new("milk"), Item::new("Bread")];

    let merged = carry_checked_state(&previous, next);
    assert!(merged[0].checked);
    assert!(!merged[1].checked);
}

#[test]
fn list_lines_show_items_and_shared_marker() {
    let mut shared = list("0190aaaa-0001", "Groceries", "alice");
    shared.items[1].checked = true;
    let lines = format_list_lines(&[VisibleList::for_user(shared, &UserId::from("bob"))]);

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("0190aaaa-0001"));
    assert!(lines[0].contains("1/2"));
    assert!(lines[0].contains("(shared with you)"));
    assert_eq!(lines[1], "    [ ] 1. Milk");
    assert_eq!(lines[2], "    [x] 2. Eggs");
}

#[test]
fn item_lines_are_numbered_from_one() {
    assert_eq!(format_item_line(0, &Item::new("Milk")), "[ ] 1. Milk");
}

#[test]
fn share_targets_and_messages() {
    assert!(is_email_target("bob@example.com"));
    assert!(!is_email_target("user-123"));
    assert_eq!(
        share_message("Groceries", "bob@example.com", true, false),
        "Shared 'Groceries' with bob@example.com"
    );
    assert!(share_message("Groceries", "bob@example.com", true, true).contains("notification"));
    assert!(share_message("Groceries", "new@example.com", false, true).contains("invitation"));
}

#[test]
fn config_init_prefers_flags_then_env_then_existing() {
    let existing = ClientConfig {
        supabase_url: Some("https://old.supabase.co".into()),
        supabase_anon_key: Some("old-key".into()),
        notify_api_base_url: Some("https://api.old.example".into()),
        ..ClientConfig::default()
    };
    let environment = ClientConfig {
        supabase_anon_key: Some("env-key".into()),
        notify_api_base_url: Some("https://api.env.example".into()),
        ..ClientConfig::default()
    };
    let explicit = ClientConfig {
        notify_api_base_url: Some("https://api.flag.example".into()),
        supabase_url: Some("   ".into()),
        ..ClientConfig::default()
    };

    let merged = merge_init_values(existing, environment, explicit);
    assert_eq!(merged.supabase_url.as_deref(), Some("https://old.supabase.co"));
    assert_eq!(merged.supabase_anon_key.as_deref(), Some("env-key"));
    assert_eq!(
        merged.notify_api_base_url.as_deref(),
        Some("https://api.flag.example")
    );
}

#[test]
fn global_flags_parse_after_subcommand() {
    let cli = Cli::try_parse_from(["trolley", "toggle", "Groceries", "2", "--offline"]).unwrap();
    assert!(cli.offline);
    assert!(matches!(
        cli.command,
        Commands::Toggle { ref list, item: 2 } if list == "Groceries"
    ));
}

#[test]
fn create_requires_items_argument() {
    assert!(Cli::try_parse_from(["trolley", "create", "Groceries"]).is_err());
}

#[test]
fn explicit_data_dir_wins() {
    let dir = resolve_data_dir(Some(PathBuf::from("/tmp/trolley-test"))).unwrap();
    assert_eq!(dir, PathBuf::from("/tmp/trolley-test"));
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("trolley"));
}

#[test]
fn completions_can_be_written_to_a_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("trolley.fish");
    run_completions(CompletionShell::Fish, Some(&path)).unwrap();
    assert!(std::fs::read_to_string(path).unwrap().contains("trolley"));
}

#[tokio::test(flavor = "multi_thread")]
async fn register_profile_keeps_existing_display_name() {
    let remote = MemoryListStore::new();
    let user = auth_session("alice").user;

    register_profile(&remote, &user, Some("Alice".to_string()))
        .await
        .unwrap();
    register_profile(&remote, &user, None).await.unwrap();

    let profile = remote
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("Alice"));
}

#[tokio::test(flavor = "multi_thread")]
async fn register_profile_skips_users_without_email() {
    let remote = MemoryListStore::new();
    let user = AuthUser {
        id: UserId::from("anon"),
        email: None,
    };
    register_profile(&remote, &user, None).await.unwrap();
    assert!(remote
        .find_user_by_email("anon")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_run_shows_lists_written_while_online() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ClientConfig::default();

    {
        let stores = open_stores(tmp.path(), &config, true).await.unwrap();
        assert!(stores.online);
        let workspace =
            Workspace::start(auth_session("alice"), AuthState::new(), config.clone(), stores).await;
        workspace
            .gateway
            .create("Groceries", &["Milk", "Eggs"], Visibility::Private)
            .await
            .unwrap();
        workspace.persist_view().await.unwrap();
        workspace.finish().await;
    }

    let stores = open_stores(tmp.path(), &config, false).await.unwrap();
    assert!(!stores.online);
    let workspace = Workspace::start(auth_session("alice"), AuthState::new(), config, stores).await;

    let lists = workspace.visible_lists().await;
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].list.name, "Groceries");
    assert!(lists[0].is_owner);
    assert_eq!(workspace.view_state().await.0, ViewSource::Cache);

    let error = workspace
        .gateway
        .create("Pharmacy", &["Aspirin"], Visibility::Private)
        .await
        .unwrap_err();
    assert!(matches!(error, trolley_core::Error::Offline(_)));
    workspace.finish().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn online_run_reads_the_list_database() {
    let tmp = tempfile::tempdir().unwrap();
    let config = ClientConfig::default();

    let stores = open_stores(tmp.path(), &config, true).await.unwrap();
    let remote = Arc::clone(&stores.remote);
    let owner = auth_session("alice").user.id;
    let draft = trolley_core::models::ListDraft::new("Hardware", &["Nails"], Visibility::Public)
        .unwrap();
    remote.create(&owner, &draft).await.unwrap();

    let workspace = Workspace::start(auth_session("alice"), AuthState::new(), config, stores).await;
    assert_eq!(workspace.view_state().await.0, ViewSource::Remote);
    let resolved = workspace.resolve_list("hardware").await.unwrap();
    assert_eq!(resolved.items, vec![Item::new("Nails")]);
    workspace.finish().await;
}
