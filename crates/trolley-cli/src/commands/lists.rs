use trolley_core::sync::ViewSource;

use crate::commands::common::{format_list_lines, open_workspace, source_label, ListsOutput};
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_lists(options: &GlobalOptions, as_json: bool) -> Result<(), CliError> {
    let workspace = open_workspace(options).await?;
    let lists = workspace.visible_lists().await;
    let (source, notice) = workspace.view_state().await;
    workspace.finish().await;

    if as_json {
        let output = ListsOutput {
            source: source_label(source),
            notice,
            lists,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(notice) = notice {
        eprintln!("{notice}");
    }
    if lists.is_empty() {
        println!("No shopping lists yet. Create one with `trolley create`.");
    } else {
        for line in format_list_lines(&lists) {
            println!("{line}");
        }
    }
    if source == ViewSource::Cache {
        eprintln!("Offline: showing the last synced copy.");
    }
    Ok(())
}
