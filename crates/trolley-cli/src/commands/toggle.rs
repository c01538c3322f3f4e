use trolley_core::ToggleOutcome;

use crate::commands::common::{format_item_line, open_workspace};
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_toggle(
    options: &GlobalOptions,
    list_query: &str,
    item_number: usize,
) -> Result<(), CliError> {
    let index = item_number
        .checked_sub(1)
        .ok_or(CliError::InvalidItemNumber)?;

    let workspace = open_workspace(options).await?;
    let result = async {
        let list = workspace.resolve_list(list_query).await?;
        let outcome = workspace.gateway.toggle_item_checked(&list.id, index).await?;
        if outcome == ToggleOutcome::Synced {
            workspace.persist_view().await?;
        }
        let view = workspace.gateway.session().view().lock().await;
        let line = view
            .find(&list.id)
            .and_then(|list| list.items.get(index))
            .map(|item| format_item_line(index, item));
        Ok::<_, CliError>((outcome, line))
    }
    .await;
    workspace.finish().await;

    let (outcome, line) = result?;
    if let Some(line) = line {
        println!("{line}");
    }
    if outcome == ToggleOutcome::LocalOnly {
        eprintln!("Offline: the change was not saved and will be replaced on the next sync.");
    }
    Ok(())
}
