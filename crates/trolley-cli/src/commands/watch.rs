use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use trolley_core::remote::LibSqlListStore;
use trolley_core::sync::{ListView, SharedListView};
use trolley_core::Connectivity;

use crate::commands::common::{format_list_lines, open_workspace, source_label};
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_watch(options: &GlobalOptions, refresh_secs: u64) -> Result<(), CliError> {
    let mut workspace = open_workspace(options).await?;
    let view = Arc::clone(workspace.gateway.session().view());
    print_view(&*view.lock().await);

    let printer = spawn_printer(view, workspace.controller.view_updates());
    let connectivity = workspace.controller.backend().connectivity.clone();
    let refresher = (connectivity.is_online() && refresh_secs > 0).then(|| {
        spawn_refresher(
            Arc::clone(&workspace.remote),
            connectivity,
            Duration::from_secs(refresh_secs),
        )
    });

    eprintln!("Watching your lists. Press Ctrl-C to stop.");
    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to listen for Ctrl-C");
        }
    };
    workspace
        .controller
        .run_until(workspace.auth_state.subscribe(), shutdown)
        .await;

    if let Some(refresher) = refresher {
        refresher.abort();
    }
    printer.abort();
    workspace.finish().await;
    Ok(())
}

fn spawn_printer(
    view: SharedListView,
    mut updates: tokio::sync::watch::Receiver<u64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            print_view(&*view.lock().await);
        }
    })
}

/// Pull from the remote database on a fixed interval. Failed pulls mark the
/// run offline until a later pull succeeds.
fn spawn_refresher(
    remote: Arc<LibSqlListStore>,
    connectivity: Connectivity,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match remote.refresh().await {
                Ok(()) => {
                    connectivity.set_online(true);
                }
                Err(error) => {
                    tracing::warn!(%error, "Refresh failed");
                    connectivity.set_online(false);
                }
            }
        }
    })
}

pub fn render_view(view: &ListView) -> Vec<String> {
    let lists = view.visible_lists();
    let mut lines = vec![format!(
        "--- {} lists ({}) ---",
        lists.len(),
        source_label(view.source())
    )];
    if let Some(notice) = view.notice() {
        lines.push(notice.to_string());
    }
    lines.extend(format_list_lines(&lists));
    lines
}

fn print_view(view: &ListView) {
    for line in render_view(view) {
        println!("{line}");
    }
}
