use trolley_core::models::parse_items;
use trolley_core::Visibility;

use crate::commands::common::open_workspace;
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_create(
    options: &GlobalOptions,
    name: &str,
    items_text: &str,
    public: bool,
) -> Result<(), CliError> {
    let visibility = if public {
        Visibility::Public
    } else {
        Visibility::Private
    };
    let item_names = parse_items(items_text)
        .into_iter()
        .map(|item| item.name)
        .collect::<Vec<_>>();

    let workspace = open_workspace(options).await?;
    let result = workspace
        .gateway
        .create(name, &item_names, visibility)
        .await;
    if result.is_ok() {
        workspace.persist_view().await?;
    }
    workspace.finish().await;

    println!("{}", result?.id);
    Ok(())
}
