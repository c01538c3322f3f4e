use trolley_core::models::parse_items;

use crate::commands::common::{carry_checked_state, open_workspace};
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_edit(
    options: &GlobalOptions,
    list_query: &str,
    name: Option<&str>,
    items_text: Option<&str>,
) -> Result<(), CliError> {
    let workspace = open_workspace(options).await?;
    let result = async {
        let list = workspace.resolve_list(list_query).await?;
        let name = name.unwrap_or(&list.name);
        let items = items_text.map_or_else(
            || list.items.clone(),
            |text| carry_checked_state(&list.items, parse_items(text)),
        );
        let updated = workspace.gateway.update(&list.id, name, &items).await?;
        workspace.persist_view().await?;
        Ok::<_, CliError>(updated)
    }
    .await;
    workspace.finish().await;

    println!("{}", result?.id);
    Ok(())
}
